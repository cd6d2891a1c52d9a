//! Shared builders for unit tests.

use crate::dataset::{Record, Table};

use bytes::Bytes;
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// Encode a 100x100 single-colour PNG.
pub fn png_bytes(red: u8, green: u8, blue: u8) -> Bytes {
    let img = RgbImage::from_pixel(100, 100, Rgb([red, green, blue]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    Bytes::from(buf.into_inner())
}

/// Build a record with plausible granule metadata. The derived columns are
/// filled in by [Table::from_records].
pub fn record(granule_id: &str, start_date: &str, image: Option<Bytes>) -> Record {
    Record {
        granule_id: granule_id.to_string(),
        start_date: start_date.to_string(),
        satellite: "Aqua".to_string(),
        resolution_km: Some(1.0),
        cloud_fraction: Some(0.25),
        image,
        year: 0,
        month: 0,
    }
}

/// A three-row table with embedded images, deliberately not in chronological
/// order.
pub fn test_table() -> Table {
    let records = vec![
        record("A", "2020-06-15", Some(png_bytes(200, 40, 40))),
        record("B", "2019-01-01", Some(png_bytes(40, 200, 40))),
        record("C", "2020-01-10", Some(png_bytes(40, 40, 200))),
    ];
    Table::from_records(records).unwrap()
}
