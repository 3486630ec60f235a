//! Fixture images shared by unit tests.

use std::io::Cursor;

fn encode(format: image::ImageFormat) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(8, 8, image::Rgb([200, 100, 50]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img).write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// A small baseline JPEG with no metadata segments.
pub fn sample_jpeg() -> Vec<u8> {
    encode(image::ImageFormat::Jpeg)
}

pub fn sample_png() -> Vec<u8> {
    encode(image::ImageFormat::Png)
}

/// A JPEG whose EXIF segment is present but unparsable.
pub fn corrupt_exif_jpeg() -> Vec<u8> {
    let clean = sample_jpeg();
    let mut out = vec![0xFF, 0xD8, 0xFF, 0xE1, 0x00, 0x10];
    out.extend_from_slice(b"Exif\0\0XX\0\0\0\0\0\0");
    out.extend_from_slice(&clean[2..]);
    out
}
