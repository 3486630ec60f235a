//! Fixture builders shared by the integration tests.
#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};

use img_parts::png::{Png, PngChunk};
use img_parts::{Bytes, ImageEXIF};
use photomark::config::{BackupConfig, Config};
use photomark::exif::tags::*;
use photomark::exif::{FieldValue, RawContainer, Segment, decode, encode};
use photomark::pipeline::MetadataService;

fn encode_image(format: image::ImageFormat) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(16, 16, image::Rgb([30, 120, 210]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img).write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn plain_jpeg() -> Vec<u8> {
    encode_image(image::ImageFormat::Jpeg)
}

pub fn plain_png() -> Vec<u8> {
    encode_image(image::ImageFormat::Png)
}

/// A JPEG carrying camera fields and one private tag the engine does not know.
pub fn camera_jpeg() -> Vec<u8> {
    let original = plain_jpeg();
    let mut c = RawContainer::new();
    c.set(Segment::Primary, TAG_MAKE, FieldValue::ascii("Canon"));
    c.set(Segment::Primary, TAG_MODEL, FieldValue::ascii("EOS R5"));
    c.set(Segment::Primary, 0xC4A5, FieldValue::Undefined(vec![1, 2, 3, 4, 5, 6]));
    c.set(Segment::Exif, TAG_F_NUMBER, FieldValue::Rational(vec![(40, 10)]));
    c.set(Segment::Exif, TAG_EXPOSURE_TIME, FieldValue::Rational(vec![(1, 125)]));
    c.set(Segment::Exif, TAG_ISO, FieldValue::Short(vec![800]));
    c.set(Segment::Exif, TAG_FOCAL_LENGTH, FieldValue::Rational(vec![(35, 1)]));
    c.set(Segment::Exif, TAG_DATE_TIME_ORIGINAL, FieldValue::ascii("2023:08:15 09:30:00"));
    encode(&c, &original).unwrap()
}

/// A JPEG whose EXIF segment exists but cannot be parsed.
pub fn corrupt_jpeg() -> Vec<u8> {
    let clean = plain_jpeg();
    let mut out = vec![0xFF, 0xD8, 0xFF, 0xE1, 0x00, 0x10];
    out.extend_from_slice(b"Exif\0\0XX\0\0\0\0\0\0");
    out.extend_from_slice(&clean[2..]);
    out
}

/// A little-endian TIFF with a single IFD0 entry: Make = "Nikon".
pub fn tiny_tiff() -> Vec<u8> {
    let mut out = b"II*\0".to_vec();
    out.extend_from_slice(&8u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&TAG_MAKE.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&6u32.to_le_bytes());
    out.extend_from_slice(&26u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(b"Nikon\0");
    out
}

/// A PNG with an uncompressed XMP iTXt chunk and an eXIf chunk.
pub fn png_with_xmp(xmp: &str, rating: u16) -> Vec<u8> {
    let mut png = Png::from_bytes(Bytes::from(plain_png())).unwrap();

    let mut exif = RawContainer::new();
    exif.set(Segment::Primary, TAG_RATING, FieldValue::Short(vec![rating]));
    let tiff = {
        // borrow a JPEG round trip to get the serialized TIFF block
        let jpeg = encode(&exif, &plain_jpeg()).unwrap();
        let parsed = img_parts::jpeg::Jpeg::from_bytes(Bytes::from(jpeg)).unwrap();
        parsed.exif().unwrap()
    };
    png.set_exif(Some(tiff));

    let mut itxt = b"XML:com.adobe.xmp\0\0\0\0\0".to_vec();
    itxt.extend_from_slice(xmp.as_bytes());
    let chunks = png.chunks_mut();
    let iend = chunks.len() - 1;
    chunks.insert(iend, PngChunk::new(*b"iTXt", Bytes::from(itxt)));

    let bytes = png.encoder().bytes().to_vec();
    assert!(decode(&bytes).unwrap().xmp().is_some());
    bytes
}

pub fn service() -> MetadataService {
    let mut config = Config::default();
    config.backup = BackupConfig { retire_delay_ms: 20, ..Default::default() };
    MetadataService::new(config)
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
