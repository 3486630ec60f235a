use img_parts::jpeg::Jpeg;
use img_parts::png::Png;
use img_parts::{Bytes, ImageEXIF};

use super::container::{RawContainer, Segment};
use super::iptc::{APP13_HEADER, IptcBlock};
use super::tags::{TAG_IPTC_NAA, TAG_XMP_PACKET};
use super::tiff;
use crate::error::{MetadataError, Result};
use crate::pipeline::ImageKind;

pub(crate) const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
pub(crate) const MARKER_APP1: u8 = 0xE1;
pub(crate) const MARKER_APP13: u8 = 0xED;
const PNG_XMP_KEYWORD: &[u8] = b"XML:com.adobe.xmp";

/// Decode the metadata container of an in-memory image.
///
/// The format is sniffed from the leading bytes. A file of a known format
/// with no metadata yields an empty container; an unknown signature yields
/// [`MetadataError::UnsupportedFormat`].
pub fn decode(bytes: &[u8]) -> Result<RawContainer> {
    let kind = ImageKind::from_signature(bytes)
        .ok_or_else(|| MetadataError::UnsupportedFormat("unrecognized file signature".into()))?;

    let mut container = RawContainer::new();
    match kind {
        ImageKind::Jpeg => decode_jpeg(bytes, &mut container)?,
        ImageKind::Png => decode_png(bytes, &mut container)?,
        ImageKind::Tiff => decode_tiff(bytes, &mut container)?,
    }
    Ok(container)
}

fn decode_jpeg(bytes: &[u8], container: &mut RawContainer) -> Result<()> {
    let jpeg = Jpeg::from_bytes(Bytes::copy_from_slice(bytes))
        .map_err(|e| MetadataError::Malformed(format!("Failed to parse JPEG: {e}")))?;

    if let Some(exif) = jpeg.exif() {
        tiff::parse_into(&exif, container)?;
    }

    for segment in jpeg.segments() {
        let contents = segment.contents();
        match segment.marker() {
            MARKER_APP1 if container.xmp().is_none() => {
                if let Some(packet) = contents.strip_prefix(XMP_HEADER) {
                    container.set_xmp(Some(String::from_utf8_lossy(packet).into_owned()));
                }
            }
            MARKER_APP13 if container.iptc().is_none() && contents.starts_with(APP13_HEADER) => {
                container.set_iptc(Some(IptcBlock::from_app13(contents)));
            }
            _ => {}
        }
    }
    Ok(())
}

fn decode_png(bytes: &[u8], container: &mut RawContainer) -> Result<()> {
    let png = Png::from_bytes(Bytes::copy_from_slice(bytes))
        .map_err(|e| MetadataError::Malformed(format!("Failed to parse PNG: {e}")))?;

    if let Some(exif) = png.exif() {
        tiff::parse_into(&exif, container)?;
    }

    for chunk in png.chunks() {
        if &chunk.kind() == b"iTXt" {
            if let Some(packet) = itxt_xmp(chunk.contents()) {
                container.set_xmp(Some(packet));
                break;
            }
        }
    }
    Ok(())
}

/// Extract the XMP packet from an uncompressed iTXt chunk.
fn itxt_xmp(contents: &[u8]) -> Option<String> {
    let rest = contents.strip_prefix(PNG_XMP_KEYWORD)?.strip_prefix(b"\0")?;
    let (&compressed, rest) = rest.split_first()?;
    if compressed != 0 {
        log::debug!("Compressed XMP iTXt chunk not supported, ignoring");
        return None;
    }
    // compression method, then NUL-terminated language tag and translated keyword
    let rest = rest.get(1..)?;
    let lang_end = rest.iter().position(|&b| b == 0)?;
    let rest = &rest[lang_end + 1..];
    let translated_end = rest.iter().position(|&b| b == 0)?;
    let text = &rest[translated_end + 1..];
    Some(String::from_utf8_lossy(text).into_owned())
}

fn decode_tiff(bytes: &[u8], container: &mut RawContainer) -> Result<()> {
    tiff::parse_into(bytes, container)?;
    let order = container.byte_order();

    if let Some(packet) = container.get(Segment::Primary, TAG_XMP_PACKET) {
        let raw = packet.as_bytes(order);
        let text = String::from_utf8_lossy(&raw).trim_end_matches('\0').to_string();
        container.set_xmp(Some(text));
    }
    if let Some(iim) = container.get(Segment::Primary, TAG_IPTC_NAA) {
        // IPTC-NAA is often typed LONG; the payload bytes are what matter
        let block = IptcBlock::from_iim(&iim.as_bytes(order));
        container.set_iptc(Some(block));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif::container::FieldValue;
    use crate::exif::tags::TAG_MAKE;

    #[test]
    fn rejects_unknown_signature() {
        let err = decode(b"GIF89a....").unwrap_err();
        assert!(matches!(err, MetadataError::UnsupportedFormat(_)));
    }

    #[test]
    fn reads_bare_tiff() {
        let mut c = RawContainer::new();
        c.set(Segment::Primary, TAG_MAKE, FieldValue::ascii("Nikon"));
        c.set(Segment::Primary, TAG_XMP_PACKET, FieldValue::Byte(b"<x:xmpmeta/>".to_vec()));
        let blob = tiff::serialize(&c).unwrap();

        let decoded = decode(&blob).unwrap();
        let make = decoded.get(Segment::Primary, TAG_MAKE).and_then(FieldValue::as_text);
        assert_eq!(make.as_deref(), Some("Nikon"));
        assert_eq!(decoded.xmp(), Some("<x:xmpmeta/>"));
        assert!(decoded.iptc().is_none());
    }

    #[test]
    fn parses_itxt_xmp() {
        let mut chunk = PNG_XMP_KEYWORD.to_vec();
        chunk.extend_from_slice(b"\0\0\0\0\0<x:xmpmeta/>");
        assert_eq!(itxt_xmp(&chunk).as_deref(), Some("<x:xmpmeta/>"));

        let mut compressed = PNG_XMP_KEYWORD.to_vec();
        compressed.extend_from_slice(b"\0\x01\0\0\0xyz");
        assert_eq!(itxt_xmp(&compressed), None);
        assert_eq!(itxt_xmp(b"Comment\0\0\0\0\0hi"), None);
    }
}
