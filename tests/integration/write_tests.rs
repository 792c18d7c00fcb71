//! Writer integration tests.
//!
//! Tests verify:
//! - Write then read is the identity for every pixel type
//! - Compression, strip height and container variant do not change pixels
//! - The stored OME-XML is the caller's, or a synthesized XYCZT descriptor
//! - Invalid arrays and options are rejected before anything is written

use std::io::{Cursor, Read};

use ndarray::{Array, Array5};

use ome_tiff::format::tiff::{TiffContainer, TiffTag};
use ome_tiff::{
    write_ometiff, write_ometiff_to, BigTiffMode, BytesRangeReader, Compression, OmeArray,
    OmeTiffError, OmeTiffFile, Pixel, PixelType, TiffError, WriteOptions,
};

use super::test_utils::{init_tracing, is_bigtiff_magic, is_tiff_magic};

fn write_to_memory(array: &OmeArray, options: &WriteOptions) -> Vec<u8> {
    write_ometiff_to(Cursor::new(Vec::new()), array, None, options)
        .unwrap()
        .into_inner()
}

fn read_back(data: Vec<u8>) -> (OmeArray, String) {
    OmeTiffFile::from_reader(BytesRangeReader::new(data, "mem"))
        .unwrap()
        .read()
        .unwrap()
}

fn ramp<T: Pixel>(convert: impl Fn(usize) -> T) -> OmeArray {
    Array5::from_shape_fn((2, 2, 3, 5, 9), |(t, z, c, y, x)| {
        convert((((t * 2 + z) * 3 + c) * 5 + y) * 9 + x)
    })
    .into()
}

// =============================================================================
// Round Trips
// =============================================================================

#[test]
fn test_round_trip_every_pixel_type() {
    init_tracing();
    let arrays = [
        ramp(|i| i as u8),
        ramp(|i| (i * 131) as u16),
        ramp(|i| (i * 70_001) as u32),
        ramp(|i| (i as i64 - 128) as i8),
        ramp(|i| i as i16 - 300),
        ramp(|i| i as i32 * -40_000),
        ramp(|i| i as f32 / 7.0),
        ramp(|i| (i as f64).sqrt() - 10.0),
    ];
    let kinds: Vec<PixelType> = arrays.iter().map(|a| a.pixel_type()).collect();
    for kind in PixelType::ALL {
        assert!(kinds.contains(&kind), "missing {}", kind);
    }

    for array in &arrays {
        let (read, xml) = read_back(write_to_memory(array, &WriteOptions::default()));
        assert_eq!(&read, array, "{}", array.pixel_type());
        assert!(xml.contains(&format!("Type=\"{}\"", array.pixel_type())));
    }
}

#[test]
fn test_compression_is_transparent() {
    let array = ramp(|i| (i % 50_000) as u16);
    let plain = write_to_memory(&array, &WriteOptions::default());

    for compression in [
        Compression::Lzw,
        Compression::Deflate,
        Compression::AdobeDeflate,
    ] {
        let options = WriteOptions {
            compression,
            ..Default::default()
        };
        let packed = write_to_memory(&array, &options);

        let reader = BytesRangeReader::new(packed.clone(), "mem");
        let container = TiffContainer::parse(&reader).unwrap();
        assert!(container
            .pages
            .iter()
            .all(|page| page.compression == compression.as_u16()));

        assert_eq!(read_back(packed).0, read_back(plain.clone()).0);
    }
}

#[test]
fn test_rows_per_strip() {
    let array = ramp(|i| i as u32);
    for rows in [1, 2, 5, 100] {
        let options = WriteOptions {
            rows_per_strip: Some(rows),
            ..Default::default()
        };
        let data = write_to_memory(&array, &options);

        let reader = BytesRangeReader::new(data.clone(), "mem");
        let container = TiffContainer::parse(&reader).unwrap();
        let strips = container.pages[0]
            .ifd
            .get_entry_by_tag(TiffTag::StripOffsets)
            .unwrap()
            .count;
        assert_eq!(strips, 5u64.div_ceil(rows.min(5) as u64));
        assert_eq!(read_back(data).0, array);
    }
}

#[test]
fn test_page_layout() {
    let array: OmeArray = Array5::<u8>::zeros((2, 3, 4, 8, 8)).into();
    let data = write_to_memory(&array, &WriteOptions::default());
    assert!(is_tiff_magic(&data));
    assert_eq!(&data[..2], b"II");

    let reader = BytesRangeReader::new(data, "mem");
    let container = TiffContainer::parse(&reader).unwrap();
    assert_eq!(container.page_count(), 24);
    for page in &container.pages {
        assert_eq!((page.width, page.height), (8, 8));
        assert_eq!(page.samples_per_pixel, 1);
        assert!(page.tiles.is_none());
    }
    // Only the first page carries the description
    assert!(container.pages[0].ifd.has_tag(TiffTag::ImageDescription));
    assert!(!container.pages[1].ifd.has_tag(TiffTag::ImageDescription));
}

#[test]
fn test_forced_bigtiff() {
    let array = ramp(|i| i as f32);
    let options = WriteOptions {
        bigtiff: BigTiffMode::Always,
        compression: Compression::Deflate,
        ..Default::default()
    };
    let data = write_to_memory(&array, &options);
    assert!(is_bigtiff_magic(&data));
    assert_eq!(read_back(data).0, array);
}

#[test]
fn test_caller_xml_is_kept() {
    let array: OmeArray = Array5::<u16>::zeros((1, 1, 1, 4, 4)).into();
    let xml = r#"<?xml version="1.0"?><OME xmlns="http://www.openmicroscopy.org/Schemas/OME/2016-06"><!-- acquired upstream --><Image ID="Image:42"><Pixels ID="Pixels:42" DimensionOrder="XYCZT" Type="uint16" SizeX="4" SizeY="4" SizeZ="1" SizeC="1" SizeT="1"/></Image></OME>"#;

    let data = write_ometiff_to(Cursor::new(Vec::new()), &array, Some(xml), &WriteOptions::default())
        .unwrap()
        .into_inner();
    let (read, stored) = read_back(data);
    assert_eq!(stored, xml);
    assert_eq!(read, array);
}

#[test]
fn test_write_to_disk_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.ome.tif");

    let first: OmeArray = Array5::<u8>::from_elem((1, 1, 2, 16, 16), 3).into();
    write_ometiff(&path, &first, None, &WriteOptions::default()).unwrap();
    let second = ramp(|i| i as i16);
    write_ometiff(&path, &second, None, &WriteOptions::default()).unwrap();

    let (read, _) = ome_tiff::read_ometiff(&path).unwrap();
    assert_eq!(read, second);
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_non_canonical_array_is_rejected() {
    let arrays: [OmeArray; 3] = [
        Array::<u8, _>::zeros((4, 4)).into(),
        Array::<u8, _>::zeros((1, 1, 1, 1, 4, 4)).into(),
        Array::<u8, _>::zeros((1, 0, 1, 4, 4)).into(),
    ];
    for array in &arrays {
        let result = write_ometiff_to(Cursor::new(Vec::new()), array, None, &WriteOptions::default());
        assert!(matches!(result, Err(OmeTiffError::Shape(_))));
    }
}

#[test]
fn test_invalid_options() {
    let array = ramp(|i| i as u8);

    let options: WriteOptions = serde_json::from_str(r#"{"compression": "jpeg"}"#).unwrap();
    assert!(matches!(
        write_ometiff_to(Cursor::new(Vec::new()), &array, None, &options),
        Err(OmeTiffError::Tiff(TiffError::UnsupportedCompression(_)))
    ));

    let options = WriteOptions {
        rows_per_strip: Some(0),
        ..Default::default()
    };
    assert!(matches!(
        write_ometiff_to(Cursor::new(Vec::new()), &array, None, &options),
        Err(OmeTiffError::InvalidOptions(_))
    ));
}

/// Writes about 4.3 GB; run with `cargo test -- --ignored`.
#[test]
#[ignore]
fn test_large_file_switches_to_bigtiff() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("large.ome.tif");

    // 65 planes of 8192 x 8192 bytes
    let array: OmeArray = Array5::<u8>::from_elem((65, 1, 1, 8192, 8192), 7).into();
    write_ometiff(&path, &array, None, &WriteOptions::default()).unwrap();

    let mut header = [0u8; 16];
    std::fs::File::open(&path)
        .unwrap()
        .read_exact(&mut header)
        .unwrap();
    assert!(is_bigtiff_magic(&header));

    let file = OmeTiffFile::open(&path).unwrap();
    assert_eq!(file.page_count(), 65);
    assert_eq!(file.metadata().images[0].pixels.size_t, 65);
}
