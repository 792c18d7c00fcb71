//! Metadata integration tests.
//!
//! Tests verify:
//! - Synthesized descriptors match the written layout
//! - Edits touch only the overridden attributes
//! - Edited metadata drives how pixels are read back
//! - Overrides load from configuration files

use std::io::Cursor;

use ndarray::Array5;

use ome_tiff::{
    detect_format, synthesize_metadata, update_metadata, write_ometiff_to, BytesRangeReader,
    DimensionOrder, FileFormat, MetadataOverrides, OmeArray, OmeDocument, OmeTiffError,
    OmeTiffFile, PixelType, WriteOptions,
};

use super::test_utils::init_tracing;

fn canonical() -> OmeArray {
    Array5::from_shape_fn((1, 3, 2, 4, 4), |(_, z, c, y, x)| {
        (z * 1000 + c * 100 + y * 10 + x) as u16
    })
    .into()
}

#[test]
fn test_synthesized_metadata_describes_the_file() {
    let array = canonical();
    let xml = synthesize_metadata(&array).unwrap();
    let data = write_ometiff_to(Cursor::new(Vec::new()), &array, None, &WriteOptions::default())
        .unwrap()
        .into_inner();

    let reader = BytesRangeReader::new(data, "mem");
    assert_eq!(detect_format(&reader).unwrap(), FileFormat::OmeTiff);

    let file = OmeTiffFile::from_reader(reader).unwrap();
    assert_eq!(file.ome_xml(), xml);

    let pixels = &file.metadata().images[0].pixels;
    assert_eq!(pixels.dimension_order().unwrap(), DimensionOrder::XYCZT);
    assert_eq!(pixels.pixel_type(), Some(PixelType::Uint16));
    assert_eq!(pixels.channels.len(), 2);
    assert_eq!(pixels.tiff_data.len(), file.page_count());
    // C varies fastest
    assert_eq!(pixels.tiff_data[1].first_c, Some(1));
    assert_eq!(pixels.tiff_data[2].first_z, Some(1));
}

#[test]
fn test_size_t_edit_changes_only_size_t() {
    init_tracing();
    let xml = synthesize_metadata(&canonical()).unwrap();
    let overrides = MetadataOverrides {
        size_t: Some(9),
        ..Default::default()
    };
    let edited = update_metadata(&xml, &overrides).unwrap();

    assert_eq!(edited.len(), xml.len());
    let differing: Vec<usize> = xml
        .bytes()
        .zip(edited.bytes())
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(differing.len(), 1);
    let at = differing[0];
    assert!(xml[..at].ends_with("SizeT=\""));
    assert_eq!(&edited[at..at + 1], "9");
}

#[test]
fn test_edited_metadata_drives_reading() {
    // Six planes written as C=2, Z=3 in XYCZT order; re-declared as one
    // channel with Z=6 the same pages become a six-slice stack.
    let array = canonical();
    let xml = synthesize_metadata(&array).unwrap();
    let overrides = MetadataOverrides {
        size_z: Some(6),
        size_c: Some(1),
        ..Default::default()
    };
    let edited = update_metadata(&xml, &overrides).unwrap();

    let data = write_ometiff_to(Cursor::new(Vec::new()), &array, Some(&edited), &WriteOptions::default())
        .unwrap()
        .into_inner();
    let file = OmeTiffFile::from_reader(BytesRangeReader::new(data, "mem")).unwrap();
    let (read, stored) = file.read().unwrap();
    assert_eq!(stored, edited);

    let read: Array5<u16> = read.into_array5().unwrap();
    assert_eq!(read.shape(), &[1, 6, 1, 4, 4]);
    // Page k = z * 2 + c of the written array
    assert_eq!(read[[0, 3, 0, 2, 1]], 1000 + 100 + 21);
    assert_eq!(read[[0, 4, 0, 0, 0]], 2000);
}

#[test]
fn test_edit_order_and_type() {
    let xml = synthesize_metadata(&canonical()).unwrap();
    let overrides = MetadataOverrides {
        dimension_order: Some(DimensionOrder::XYTZC),
        pixel_type: Some(PixelType::Int16),
        image_name: Some("renamed & reviewed".to_string()),
        acquisition_date: Some("2023-11-05T08:30:00".to_string()),
        channel_name: Some("DAPI".to_string()),
        ..Default::default()
    };
    let edited = update_metadata(&xml, &overrides).unwrap();
    assert!(edited.contains("renamed &amp; reviewed"));

    let doc = OmeDocument::parse(&edited).unwrap();
    let image = &doc.images[0];
    assert_eq!(image.name.as_deref(), Some("renamed & reviewed"));
    assert_eq!(image.acquisition_date.as_deref(), Some("2023-11-05T08:30:00"));
    assert_eq!(image.pixels.dimension_order().unwrap(), DimensionOrder::XYTZC);
    assert_eq!(image.pixels.pixel_type(), Some(PixelType::Int16));
    assert_eq!(image.pixels.channels[0].name.as_deref(), Some("DAPI"));
    assert_eq!(image.pixels.channels[1].name.as_deref(), Some("C:1"));
    assert_eq!(image.pixels.tiff_data.len(), 6);
}

#[test]
fn test_overrides_from_config() {
    let overrides: MetadataOverrides = serde_json::from_str(
        r#"{
            "image_id": "Image:3",
            "size_x": 128,
            "channel_samples_per_pixel": 1,
            "acquisition_date": ""
        }"#,
    )
    .unwrap();
    let xml = synthesize_metadata(&canonical()).unwrap();
    let edited = update_metadata(&xml, &overrides).unwrap();

    let doc = OmeDocument::parse(&edited).unwrap();
    assert_eq!(doc.images[0].id, "Image:3");
    assert_eq!(doc.images[0].pixels.size_x, 128);
    assert_eq!(doc.images[0].acquisition_date.as_deref(), Some(""));

    assert!(serde_json::from_str::<MetadataOverrides>(r#"{"size_w": 3}"#).is_err());
}

#[test]
fn test_invalid_edits() {
    let xml = synthesize_metadata(&canonical()).unwrap();

    let zero = MetadataOverrides {
        size_z: Some(0),
        ..Default::default()
    };
    assert!(matches!(
        update_metadata(&xml, &zero),
        Err(OmeTiffError::Shape(_))
    ));

    let no_image = r#"<OME xmlns="http://www.openmicroscopy.org/Schemas/OME/2016-06"/>"#;
    let rename = MetadataOverrides {
        image_name: Some("x".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        update_metadata(no_image, &rename),
        Err(OmeTiffError::Metadata(_))
    ));

    assert!(matches!(
        update_metadata("<OME><Image>", &rename),
        Err(OmeTiffError::Metadata(_))
    ));
}
