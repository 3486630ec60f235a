//! IFD segments of a [`RawContainer`] read from and written to TIFF data with
//! `kamadak-exif`. The same TIFF layout backs the EXIF blob inside JPEG/PNG
//! files and TIFF files themselves.

use std::io::Cursor;

use ::exif::experimental::Writer;
use ::exif::{Context, Exif, Field, In, Rational, Reader, SRational, Tag, Value};

use super::container::{ByteOrder, FieldValue, RawContainer, Segment};
use super::tags::{
    TAG_EXIF_IFD, TAG_GPS_IFD, TAG_INTEROP_IFD, TAG_THUMBNAIL_LENGTH, TAG_THUMBNAIL_OFFSET,
};
use crate::error::{MetadataError, Result};

/// Tags that describe layout rather than content; regenerated on every encode.
fn is_structural(segment: Segment, tag: u16) -> bool {
    match segment {
        Segment::Primary => tag == TAG_EXIF_IFD || tag == TAG_GPS_IFD,
        Segment::Exif => tag == TAG_INTEROP_IFD,
        Segment::Thumbnail => tag == TAG_THUMBNAIL_OFFSET || tag == TAG_THUMBNAIL_LENGTH,
        _ => false,
    }
}

/// Where a segment lives in the IFD tree.
fn location(segment: Segment) -> (In, Context) {
    match segment {
        Segment::Primary => (In::PRIMARY, Context::Tiff),
        Segment::Exif => (In::PRIMARY, Context::Exif),
        Segment::Gps => (In::PRIMARY, Context::Gps),
        Segment::Interop => (In::PRIMARY, Context::Interop),
        Segment::Thumbnail => (In::THUMBNAIL, Context::Tiff),
    }
}

fn segment_of(field: &Field) -> Option<Segment> {
    Segment::ALL
        .into_iter()
        .find(|&segment| location(segment) == (field.ifd_num, field.tag.context()))
}

/// Parse a TIFF blob into the IFD segments of `container`.
pub(crate) fn parse_into(data: &[u8], container: &mut RawContainer) -> Result<()> {
    let exif = Reader::new()
        .read_raw(data.to_vec())
        .map_err(|e| MetadataError::Malformed(format!("Invalid TIFF structure: {e}")))?;

    container.set_byte_order(if exif.little_endian() {
        ByteOrder::Little
    } else {
        ByteOrder::Big
    });

    for field in exif.fields() {
        let number = field.tag.number();
        let Some(segment) = segment_of(field) else {
            log::debug!("Skipping {} in {:?}: no matching segment", field.tag, field.ifd_num);
            continue;
        };
        if is_structural(segment, number) {
            continue;
        }
        match field_value(&field.value) {
            Some(value) => container.set(segment, number, value),
            None => log::debug!("Skipping {} with an unknown TIFF type", field.tag),
        }
    }

    container.set_thumbnail(thumbnail(&exif));
    Ok(())
}

/// The IFD1 JPEG thumbnail, if both pointer fields resolve inside the blob.
fn thumbnail(exif: &Exif) -> Option<Vec<u8>> {
    let uint = |tag| exif.get_field(tag, In::THUMBNAIL)?.value.get_uint(0);
    let offset = uint(Tag::JPEGInterchangeFormat)? as usize;
    let len = uint(Tag::JPEGInterchangeFormatLength)? as usize;
    exif.buf().get(offset..offset.checked_add(len)?).map(<[u8]>::to_vec)
}

/// Serialize the IFD segments of `container` as a TIFF blob. Pointer fields
/// and thumbnail offsets are laid out by the writer.
pub(crate) fn serialize(container: &RawContainer) -> Result<Vec<u8>> {
    let fields: Vec<Field> = Segment::ALL
        .into_iter()
        .flat_map(|segment| {
            let (ifd_num, context) = location(segment);
            container
                .segment(segment)
                .into_iter()
                .flatten()
                .map(move |(&number, value)| Field {
                    tag: Tag(context, number),
                    ifd_num,
                    value: exif_value(value),
                })
        })
        .collect();

    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    if let Some(jpeg) = container.thumbnail() {
        writer.set_jpeg(jpeg, In::THUMBNAIL);
    }

    let mut out = Cursor::new(Vec::new());
    writer
        .write(&mut out, container.byte_order() == ByteOrder::Little)
        .map_err(|e| MetadataError::Malformed(format!("Failed to serialize EXIF: {e}")))?;
    Ok(out.into_inner())
}

fn field_value(value: &Value) -> Option<FieldValue> {
    let value = match value {
        Value::Byte(v) => FieldValue::Byte(v.clone()),
        Value::Ascii(v) => FieldValue::Ascii(v.clone()),
        Value::Short(v) => FieldValue::Short(v.clone()),
        Value::Long(v) => FieldValue::Long(v.clone()),
        Value::Rational(v) => FieldValue::Rational(v.iter().map(|r| (r.num, r.denom)).collect()),
        Value::SByte(v) => FieldValue::SByte(v.clone()),
        Value::Undefined(v, _) => FieldValue::Undefined(v.clone()),
        Value::SShort(v) => FieldValue::SShort(v.clone()),
        Value::SLong(v) => FieldValue::SLong(v.clone()),
        Value::SRational(v) => {
            FieldValue::SRational(v.iter().map(|r| (r.num, r.denom)).collect())
        }
        Value::Float(v) => FieldValue::Float(v.clone()),
        Value::Double(v) => FieldValue::Double(v.clone()),
        _ => return None,
    };
    Some(value)
}

fn exif_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Byte(v) => Value::Byte(v.clone()),
        FieldValue::Ascii(v) => Value::Ascii(v.clone()),
        FieldValue::Short(v) => Value::Short(v.clone()),
        FieldValue::Long(v) => Value::Long(v.clone()),
        FieldValue::Rational(v) => {
            Value::Rational(v.iter().map(|&(num, denom)| Rational { num, denom }).collect())
        }
        FieldValue::SByte(v) => Value::SByte(v.clone()),
        FieldValue::Undefined(v) => Value::Undefined(v.clone(), 0),
        FieldValue::SShort(v) => Value::SShort(v.clone()),
        FieldValue::SLong(v) => Value::SLong(v.clone()),
        FieldValue::SRational(v) => {
            Value::SRational(v.iter().map(|&(num, denom)| SRational { num, denom }).collect())
        }
        FieldValue::Float(v) => Value::Float(v.clone()),
        FieldValue::Double(v) => Value::Double(v.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif::tags::*;

    fn sample(order: ByteOrder) -> RawContainer {
        let mut c = RawContainer::new();
        c.set_byte_order(order);
        c.set(Segment::Primary, TAG_MAKE, FieldValue::ascii("Canon"));
        c.set(Segment::Primary, TAG_MODEL, FieldValue::ascii("EOS R6"));
        c.set(Segment::Primary, TAG_RATING, FieldValue::Short(vec![4]));
        c.set(Segment::Primary, 0xC000, FieldValue::Undefined(vec![9, 8, 7, 6, 5]));
        c.set(Segment::Exif, TAG_F_NUMBER, FieldValue::Rational(vec![(28, 10)]));
        c.set(Segment::Exif, TAG_DATE_TIME_ORIGINAL, FieldValue::ascii("2024:05:01 10:20:30"));
        c.set(Segment::Interop, 0x0001, FieldValue::ascii("R98"));
        c.set(Segment::Gps, 0x0001, FieldValue::ascii("N"));
        c.set(Segment::Thumbnail, 0x0103, FieldValue::Short(vec![6]));
        c.set_thumbnail(Some(vec![0xFF, 0xD8, 0xFF, 0xD9]));
        c
    }

    #[test]
    fn serialize_then_parse_preserves_every_segment() {
        for order in [ByteOrder::Little, ByteOrder::Big] {
            let original = sample(order);
            let blob = serialize(&original).unwrap();

            let mut parsed = RawContainer::new();
            parse_into(&blob, &mut parsed).unwrap();
            assert_eq!(parsed, original, "byte order {order:?}");
        }
    }

    #[test]
    fn serialize_is_stable_across_reparse() {
        let blob = serialize(&sample(ByteOrder::Big)).unwrap();
        let mut parsed = RawContainer::new();
        parse_into(&blob, &mut parsed).unwrap();
        assert_eq!(serialize(&parsed).unwrap(), blob);
    }

    #[test]
    fn pointer_fields_stay_out_of_segments() {
        let blob = serialize(&sample(ByteOrder::Little)).unwrap();
        let mut parsed = RawContainer::new();
        parse_into(&blob, &mut parsed).unwrap();

        assert!(parsed.get(Segment::Primary, TAG_EXIF_IFD).is_none());
        assert!(parsed.get(Segment::Primary, TAG_GPS_IFD).is_none());
        assert!(parsed.get(Segment::Exif, TAG_INTEROP_IFD).is_none());
        assert!(parsed.get(Segment::Thumbnail, TAG_THUMBNAIL_OFFSET).is_none());
        assert_eq!(parsed.thumbnail(), Some(&[0xFF, 0xD8, 0xFF, 0xD9][..]));
    }

    #[test]
    fn rejects_garbage() {
        let mut c = RawContainer::new();
        assert!(parse_into(b"XX*\0\0\0\0\0", &mut c).is_err());
        assert!(parse_into(b"II", &mut c).is_err());
    }
}
