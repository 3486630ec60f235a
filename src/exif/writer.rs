use img_parts::Bytes;
use img_parts::jpeg::{Jpeg, JpegSegment};

use super::container::{FieldValue, RawContainer, Segment};
use super::iptc::APP13_HEADER;
use super::reader::{MARKER_APP1, MARKER_APP13, XMP_HEADER};
use super::tags::{TAG_RATING, TAG_RATING_PERCENT, TAG_XP_KEYWORDS};
use super::{tiff, xmp};
use crate::error::{MetadataError, Result};
use crate::pipeline::ImageKind;
use crate::record::MetadataPatch;

const EXIF_PREFIX: &[u8] = b"Exif\0\0";
const MARKER_APP0: u8 = 0xE0;
/// Largest payload a JPEG APPn segment can carry (u16 length minus itself).
const MAX_SEGMENT_CONTENTS: usize = 65533;

/// Apply a patch to the writer-owned fields of a container.
///
/// Tags go to IPTC Keywords, XMP `dc:subject` and XPKeywords; the rating to
/// EXIF Rating/RatingPercent and XMP `xmp:Rating`. Everything else is left as decoded.
pub fn merge(container: &mut RawContainer, patch: &MetadataPatch) {
    if let Some(tags) = &patch.tags {
        set_tags(container, tags);
    }
    if let Some(rating) = patch.rating {
        set_rating(container, rating);
    }
}

fn set_tags(container: &mut RawContainer, tags: &[String]) {
    if tags.is_empty() {
        container.remove(Segment::Primary, TAG_XP_KEYWORDS);
    } else {
        container.set(Segment::Primary, TAG_XP_KEYWORDS, FieldValue::utf16(&tags.join(";")));
    }

    let mut iptc = container.iptc().cloned().unwrap_or_default();
    iptc.set_keywords(tags);
    container.set_iptc(Some(iptc).filter(|block| !block.is_empty()));

    let packet = xmp::set_bag(container.xmp(), xmp::DC_SUBJECT, tags);
    container.set_xmp(packet);
}

fn set_rating(container: &mut RawContainer, rating: i32) {
    match u16::try_from(rating) {
        Ok(value) => {
            container.set(Segment::Primary, TAG_RATING, FieldValue::Short(vec![value]));
            match rating_percent(rating) {
                Some(percent) => {
                    let value = FieldValue::Short(vec![percent]);
                    container.set(Segment::Primary, TAG_RATING_PERCENT, value)
                }
                None => {
                    container.remove(Segment::Primary, TAG_RATING_PERCENT);
                }
            }
        }
        Err(_) => {
            log::debug!("Rating {rating} does not fit the EXIF field, writing XMP only");
            container.remove(Segment::Primary, TAG_RATING);
            container.remove(Segment::Primary, TAG_RATING_PERCENT);
        }
    }

    let value = rating.to_string();
    let packet = xmp::set_property(container.xmp(), xmp::XMP_RATING, Some(&value));
    container.set_xmp(packet);
}

/// Windows "RatingPercent" companion of a star rating.
fn rating_percent(rating: i32) -> Option<u16> {
    match rating {
        0 => Some(0),
        1 => Some(1),
        2 => Some(25),
        3 => Some(50),
        4 => Some(75),
        5 => Some(99),
        _ => None,
    }
}

/// Re-encode `original` with the metadata of `container`.
///
/// Only JPEG can be written. Image data and every segment the engine does
/// not own are copied through unchanged; the EXIF segment keeps its position.
pub fn encode(container: &RawContainer, original: &[u8]) -> Result<Vec<u8>> {
    let kind = ImageKind::from_signature(original)
        .ok_or_else(|| MetadataError::UnsupportedFormat("unrecognized file signature".into()))?;
    if kind != ImageKind::Jpeg {
        return Err(MetadataError::UnsupportedWriteFormat(kind.name().to_string()));
    }

    let mut jpeg = Jpeg::from_bytes(Bytes::copy_from_slice(original))
        .map_err(|e| MetadataError::Malformed(format!("Failed to parse JPEG: {e}")))?;
    let segments = jpeg.segments_mut();

    // EXIF right after APP0 (JFIF) when newly created
    let exif_pos = find_segment(segments, MARKER_APP1, EXIF_PREFIX);
    if container.has_ifd_fields() {
        let segment = app_segment(MARKER_APP1, EXIF_PREFIX, &tiff::serialize(container)?, "EXIF")?;
        put_segment(segments, exif_pos, segment, MARKER_APP0);
    } else if let Some(pos) = exif_pos {
        segments.remove(pos);
    }

    let xmp_pos = find_segment(segments, MARKER_APP1, XMP_HEADER);
    match container.xmp() {
        Some(packet) => {
            let segment = app_segment(MARKER_APP1, XMP_HEADER, packet.as_bytes(), "XMP")?;
            put_segment(segments, xmp_pos, segment, MARKER_APP1);
        }
        None => {
            if let Some(pos) = xmp_pos {
                segments.remove(pos);
            }
        }
    }

    let iptc_pos = find_segment(segments, MARKER_APP13, APP13_HEADER);
    match container.iptc().filter(|block| !block.is_empty()) {
        Some(block) => {
            let contents = block.to_app13();
            let segment = app_segment(MARKER_APP13, &[], &contents, "IPTC")?;
            put_segment(segments, iptc_pos, segment, MARKER_APP13 - 1);
        }
        None => {
            if let Some(pos) = iptc_pos {
                segments.remove(pos);
            }
        }
    }

    Ok(jpeg.encoder().bytes().to_vec())
}

fn find_segment(segments: &[JpegSegment], marker: u8, header: &[u8]) -> Option<usize> {
    segments
        .iter()
        .position(|s| s.marker() == marker && s.contents().starts_with(header))
}

/// Replace the segment at `existing`, or insert it after the leading run of
/// APPn segments with markers up to `after_marker`.
fn put_segment(
    segments: &mut Vec<JpegSegment>,
    existing: Option<usize>,
    segment: JpegSegment,
    after_marker: u8,
) {
    match existing {
        Some(pos) => segments[pos] = segment,
        None => {
            let pos = segments
                .iter()
                .position(|s| !(MARKER_APP0..=after_marker).contains(&s.marker()))
                .unwrap_or(segments.len());
            segments.insert(pos, segment);
        }
    }
}

fn app_segment(marker: u8, header: &[u8], body: &[u8], what: &str) -> Result<JpegSegment> {
    let len = header.len() + body.len();
    if len > MAX_SEGMENT_CONTENTS {
        return Err(MetadataError::Malformed(format!(
            "{what} block of {len} bytes does not fit in a JPEG segment"
        )));
    }
    let mut contents = Vec::with_capacity(len);
    contents.extend_from_slice(header);
    contents.extend_from_slice(body);
    Ok(JpegSegment::new_with_contents(marker, Bytes::from(contents)))
}
