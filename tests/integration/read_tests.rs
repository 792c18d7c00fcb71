//! Reader integration tests.
//!
//! Tests verify:
//! - Every DimensionOrder normalizes to (T, Z, C, Y, X), with and without
//!   elided axes
//! - Byte order, BigTIFF, tiles, LZW and Deflate are transparent to the caller
//! - Malformed or non-OME inputs fail with the matching error

use ndarray::{Array2, Array5};

use ome_tiff::{
    detect_format, BytesRangeReader, Compression, DimensionOrder, FileFormat, OmeTiffError,
    OmeTiffFile, PixelType, TiffError,
};

use super::test_utils::{
    coded_canonical, coded_ome_tiff, init_tracing, is_bigtiff_magic, is_tiff_magic, ome_document,
    ome_image, ByteOrderType, Layout, Samples, TiffBuilder,
};

fn open(data: Vec<u8>) -> OmeTiffFile<BytesRangeReader> {
    OmeTiffFile::from_reader(BytesRangeReader::new(data, "test.ome.tif")).unwrap()
}

fn read_u16(data: Vec<u8>) -> Array5<u16> {
    let (array, _) = open(data).read().unwrap();
    assert_eq!(array.pixel_type(), PixelType::Uint16);
    array.into_array5().unwrap()
}

// =============================================================================
// Dimension Orders
// =============================================================================

#[test]
fn test_all_orders_decode_to_canonical() {
    init_tracing();
    for order in DimensionOrder::ALL {
        let data = coded_ome_tiff(TiffBuilder::new(), order, [5, 4, 3, 2, 2]);
        let array = read_u16(data);
        assert_eq!(array, coded_canonical(2, 3, 2, 4, 5), "order {}", order);
    }
}

#[test]
fn test_all_orders_with_unit_axes() {
    // [X, Y, Z, C, T]
    let cases = [
        [3, 2, 1, 2, 3],
        [3, 2, 2, 1, 3],
        [3, 2, 2, 3, 1],
        [3, 2, 1, 1, 4],
        [3, 2, 1, 1, 1],
    ];
    for order in DimensionOrder::ALL {
        for sizes in cases {
            let [x, y, z, c, t] = sizes;
            let array = read_u16(coded_ome_tiff(TiffBuilder::new(), order, sizes));
            assert_eq!(
                array,
                coded_canonical(t, z, c, y, x),
                "order {} sizes {:?}",
                order,
                sizes
            );
        }
    }
}

#[test]
fn test_time_series_of_single_planes() {
    // C = Z = 1, T = 3: the raw stack is (3, Y, X)
    let data = coded_ome_tiff(TiffBuilder::new(), DimensionOrder::XYCZT, [8, 6, 1, 1, 3]);
    let array = read_u16(data);
    assert_eq!(array.shape(), &[3, 1, 1, 6, 8]);
    assert_eq!(array[[2, 0, 0, 5, 7]], 2 * 256 + 5 * 16 + 7);
}

// =============================================================================
// Encodings
// =============================================================================

#[test]
fn test_big_endian_matches_little_endian() {
    let sizes = [5, 4, 2, 2, 1];
    let little = coded_ome_tiff(TiffBuilder::new(), DimensionOrder::XYZCT, sizes);
    let big = coded_ome_tiff(
        TiffBuilder::new().with_byte_order(ByteOrderType::BigEndian),
        DimensionOrder::XYZCT,
        sizes,
    );
    assert_eq!(&big[..2], b"MM");
    assert!(is_tiff_magic(&big));
    assert_eq!(read_u16(little), read_u16(big));
}

#[test]
fn test_bigtiff_matches_classic() {
    for order in [ByteOrderType::LittleEndian, ByteOrderType::BigEndian] {
        let builder = TiffBuilder::new().with_bigtiff(true).with_byte_order(order);
        let data = coded_ome_tiff(builder, DimensionOrder::XYCTZ, [4, 4, 2, 2, 2]);
        assert!(is_bigtiff_magic(&data));
        assert_eq!(read_u16(data), coded_canonical(2, 2, 2, 4, 4));
    }
}

#[test]
fn test_compressed_matches_uncompressed() {
    for compression in [
        Compression::Lzw,
        Compression::Deflate,
        Compression::AdobeDeflate,
    ] {
        let builder = TiffBuilder::new().with_compression(compression);
        let data = coded_ome_tiff(builder, DimensionOrder::XYTZC, [6, 5, 2, 2, 2]);
        assert_eq!(read_u16(data), coded_canonical(2, 2, 2, 5, 6));
    }
}

#[test]
fn test_tiled_pages_with_edge_tiles() {
    let (width, height) = (40usize, 24usize);
    let plane: Vec<u16> = (0..width * height).map(|i| i as u16).collect();
    let xml = ome_document(&[ome_image(0, "XYCZT", "uint16", [width, height, 1, 1, 1])]);

    for byte_order in [ByteOrderType::LittleEndian, ByteOrderType::BigEndian] {
        let data = TiffBuilder::new()
            .with_byte_order(byte_order)
            .with_layout(Layout::Tiles {
                width: 16,
                height: 16,
            })
            .with_compression(Compression::Deflate)
            .add_page(width as u32, height as u32, Samples::U16(plane.clone()))
            .with_description(xml.clone())
            .build();

        let array = read_u16(data);
        let expected = Array2::from_shape_vec((height, width), plane.clone()).unwrap();
        assert_eq!(array.shape(), &[1, 1, 1, height, width]);
        assert_eq!(array.slice(ndarray::s![0, 0, 0, .., ..]), expected);
    }
}

#[test]
fn test_signed_and_float_samples() {
    let xml = |ty: &str| ome_document(&[ome_image(0, "XYCZT", ty, [3, 2, 1, 1, 1])]);

    let data = TiffBuilder::new()
        .with_byte_order(ByteOrderType::BigEndian)
        .add_page(3, 2, Samples::I16(vec![-3, -2, -1, 0, 1, 2]))
        .with_description(xml("int16"))
        .build();
    let (array, _) = open(data).read().unwrap();
    let array: Array5<i16> = array.into_array5().unwrap();
    assert_eq!(array[[0, 0, 0, 0, 0]], -3);
    assert_eq!(array[[0, 0, 0, 1, 2]], 2);

    let data = TiffBuilder::new()
        .with_byte_order(ByteOrderType::BigEndian)
        .add_page(3, 2, Samples::F64(vec![0.5, 1.5, -2.25, 1e10, 0.0, -0.0]))
        .with_description(xml("double"))
        .build();
    let (array, _) = open(data).read().unwrap();
    assert_eq!(array.pixel_type(), PixelType::Double);
    let array: Array5<f64> = array.into_array5().unwrap();
    assert_eq!(array[[0, 0, 0, 0, 2]], -2.25);
    assert_eq!(array[[0, 0, 0, 1, 0]], 1e10);
}

#[test]
fn test_tiff_samples_override_declared_type() {
    // Declared uint8, stored as 32-bit unsigned
    let xml = ome_document(&[ome_image(0, "XYCZT", "uint8", [2, 1, 1, 1, 1])]);
    let data = TiffBuilder::new()
        .add_page(2, 1, Samples::U32(vec![70_000, 1]))
        .with_description(xml)
        .build();
    let (array, _) = open(data).read().unwrap();
    assert_eq!(array.pixel_type(), PixelType::Uint32);
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_unsupported_order_fails_closed() {
    let xml = ome_document(&[ome_image(0, "XYZZY", "uint16", [2, 2, 1, 1, 1])]);
    let data = TiffBuilder::new()
        .add_page(2, 2, Samples::U16(vec![0; 4]))
        .with_description(xml)
        .build();
    let file = open(data);
    assert!(matches!(
        file.read(),
        Err(OmeTiffError::UnsupportedDimensionOrder(order)) if order == "XYZZY"
    ));
}

#[test]
fn test_lzw_tiled_big_endian() {
    let (width, height) = (40usize, 24usize);
    let plane: Vec<u16> = (0..width * height).map(|i| (i % 97) as u16).collect();
    let xml = ome_document(&[ome_image(0, "XYCZT", "uint16", [width, height, 1, 1, 1])]);
    let data = TiffBuilder::new()
        .with_byte_order(ByteOrderType::BigEndian)
        .with_compression(Compression::Lzw)
        .with_layout(Layout::Tiles {
            width: 16,
            height: 16,
        })
        .add_page(width as u32, height as u32, Samples::U16(plane.clone()))
        .with_description(xml)
        .build();

    let read = read_u16(data);
    let expected = Array2::from_shape_vec((height, width), plane).unwrap();
    assert_eq!(read.slice(ndarray::s![0, 0, 0, .., ..]), expected);
}

#[test]
fn test_packbits_is_rejected() {
    let xml = ome_document(&[ome_image(0, "XYCZT", "uint8", [2, 2, 1, 1, 1])]);
    let data = TiffBuilder::new()
        .with_compression(Compression::PackBits)
        .add_page(2, 2, Samples::U8(vec![0; 4]))
        .with_description(xml)
        .build();
    let file = open(data);
    assert!(matches!(
        file.read(),
        Err(OmeTiffError::Tiff(TiffError::UnsupportedCompression(_)))
    ));
}

#[test]
fn test_plane_size_mismatch() {
    let xml = ome_document(&[ome_image(0, "XYCZT", "uint8", [4, 4, 1, 1, 1])]);
    let data = TiffBuilder::new()
        .add_page(2, 8, Samples::U8(vec![0; 16]))
        .with_description(xml)
        .build();
    assert!(matches!(open(data).read(), Err(OmeTiffError::Shape(_))));
}

#[test]
fn test_plain_tiff() {
    let data = TiffBuilder::new()
        .add_page(2, 2, Samples::U8(vec![1, 2, 3, 4]))
        .with_description("ImageJ=1.54f")
        .build();
    let reader = BytesRangeReader::new(data.clone(), "plain.tif");
    assert_eq!(detect_format(&reader).unwrap(), FileFormat::PlainTiff);
    assert!(matches!(
        OmeTiffFile::from_reader(reader),
        Err(OmeTiffError::Metadata(_))
    ));

    let undescribed = TiffBuilder::new()
        .add_page(2, 2, Samples::U8(vec![1, 2, 3, 4]))
        .build();
    assert!(matches!(
        OmeTiffFile::from_reader(BytesRangeReader::new(undescribed, "bare.tif")),
        Err(OmeTiffError::Metadata(_))
    ));
}

#[test]
fn test_malformed_xml() {
    let data = TiffBuilder::new()
        .add_page(2, 2, Samples::U8(vec![0; 4]))
        .with_description("<OME><Image ID=\"Image:0\"></OME>")
        .build();
    assert!(matches!(
        OmeTiffFile::from_reader(BytesRangeReader::new(data, "bad.ome.tif")),
        Err(OmeTiffError::Metadata(_))
    ));
}

#[test]
fn test_not_a_tiff() {
    let reader = BytesRangeReader::new(b"GIF89a not a tiff at all".to_vec(), "x.gif");
    assert!(matches!(
        OmeTiffFile::from_reader(reader),
        Err(OmeTiffError::Tiff(TiffError::InvalidMagic(_)))
    ));
}

#[test]
fn test_bigtiff_with_huge_entry_count() {
    let mut data = b"II".to_vec();
    data.extend_from_slice(&43u16.to_le_bytes());
    data.extend_from_slice(&8u16.to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&16u64.to_le_bytes());
    data.extend_from_slice(&(1u64 << 62).to_le_bytes());
    data.extend_from_slice(&[0u8; 8]);
    assert!(is_bigtiff_magic(&data));

    let reader = BytesRangeReader::new(data.clone(), "huge.ome.tif");
    assert!(matches!(
        detect_format(&reader),
        Err(TiffError::InvalidIfdOffset(16))
    ));
    assert!(matches!(
        OmeTiffFile::from_reader(BytesRangeReader::new(data, "huge.ome.tif")),
        Err(OmeTiffError::Tiff(TiffError::InvalidIfdOffset(16)))
    ));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.ome.tif");
    assert!(matches!(
        OmeTiffFile::open(&path),
        Err(OmeTiffError::Io(ome_tiff::IoError::NotFound(_)))
    ));
}

#[test]
fn test_read_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coded.ome.tif");
    let data = coded_ome_tiff(TiffBuilder::new(), DimensionOrder::XYTCZ, [3, 3, 2, 2, 2]);
    std::fs::write(&path, data).unwrap();

    let (array, xml) = ome_tiff::read_ometiff(&path).unwrap();
    assert!(xml.contains("XYTCZ"));
    assert_eq!(
        array.into_array5::<u16>().unwrap(),
        coded_canonical(2, 2, 2, 3, 3)
    );
}
