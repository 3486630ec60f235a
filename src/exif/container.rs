use std::collections::BTreeMap;

use super::iptc::IptcBlock;

/// A named sub-region of the container, addressed independently by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    /// IFD0: primary image description (make, model, XP* fields, rating).
    Primary,
    /// Exif sub-IFD with exposure data.
    Exif,
    /// GPS sub-IFD.
    Gps,
    /// Interoperability IFD hanging off the Exif IFD.
    Interop,
    /// IFD1, describing the embedded thumbnail.
    Thumbnail,
}

impl Segment {
    pub const ALL: [Segment; 5] = [
        Segment::Primary,
        Segment::Exif,
        Segment::Gps,
        Segment::Interop,
        Segment::Thumbnail,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Segment::Primary => "0th",
            Segment::Exif => "Exif",
            Segment::Gps => "GPS",
            Segment::Interop => "Interop",
            Segment::Thumbnail => "1st",
        }
    }
}

/// TIFF byte order of the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

/// A single IFD entry value, kept with its exact TIFF type so that fields the
/// engine does not understand are written back unchanged.
///
/// Mirrors `exif::Value`; the conversion lives in the IFD bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Byte(Vec<u8>),
    /// One or more strings, without NUL terminators.
    Ascii(Vec<Vec<u8>>),
    Short(Vec<u16>),
    Long(Vec<u32>),
    Rational(Vec<(u32, u32)>),
    SByte(Vec<i8>),
    Undefined(Vec<u8>),
    SShort(Vec<i16>),
    SLong(Vec<i32>),
    SRational(Vec<(i32, i32)>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl FieldValue {
    /// Build a single-string ASCII value.
    pub fn ascii(text: &str) -> Self {
        FieldValue::Ascii(vec![text.as_bytes().to_vec()])
    }

    /// Build a Windows XP* value (UTF-16LE, NUL-terminated, stored as BYTE).
    pub fn utf16(text: &str) -> Self {
        let mut bytes: Vec<u8> = text.encode_utf16().flat_map(|c| c.to_le_bytes()).collect();
        bytes.extend_from_slice(&[0, 0]);
        FieldValue::Byte(bytes)
    }

    /// Text of an ASCII value, or of an UNDEFINED value carrying an EXIF
    /// character-code prefix (UserComment).
    pub fn as_text(&self) -> Option<String> {
        let text = match self {
            FieldValue::Ascii(strings) => strings
                .iter()
                .map(|s| String::from_utf8_lossy(s))
                .collect::<Vec<_>>()
                .join("\n"),
            FieldValue::Undefined(bytes) => decode_user_comment(bytes)?,
            _ => return None,
        };
        non_empty(text)
    }

    /// Text of a Windows XP* value (UTF-16LE stored as BYTE).
    pub fn as_utf16_text(&self) -> Option<String> {
        match self {
            FieldValue::Byte(bytes) | FieldValue::Undefined(bytes) => {
                non_empty(decode_utf16le(bytes))
            }
            _ => None,
        }
    }

    /// First element as a number. Rationals with a zero denominator yield `None`.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            FieldValue::Byte(v) => v.first().map(|&x| x as f64),
            FieldValue::Short(v) => v.first().map(|&x| x as f64),
            FieldValue::Long(v) => v.first().map(|&x| x as f64),
            FieldValue::SShort(v) => v.first().map(|&x| x as f64),
            FieldValue::SLong(v) => v.first().map(|&x| x as f64),
            FieldValue::Float(v) => v.first().map(|&x| x as f64),
            FieldValue::Double(v) => v.first().copied(),
            FieldValue::Rational(v) => {
                v.first().filter(|r| r.1 != 0).map(|&(n, d)| n as f64 / d as f64)
            }
            FieldValue::SRational(v) => {
                v.first().filter(|r| r.1 != 0).map(|&(n, d)| n as f64 / d as f64)
            }
            FieldValue::Ascii(_) => self.as_text()?.trim().parse().ok(),
            _ => None,
        };
        value.filter(|x| x.is_finite())
    }

    /// Payload bytes of a field that embeds another container (XMP and IPTC
    /// inside TIFF files). LONG-typed payloads are laid out in `order`.
    pub fn as_bytes(&self, order: ByteOrder) -> Vec<u8> {
        match self {
            FieldValue::Byte(v) | FieldValue::Undefined(v) => v.clone(),
            FieldValue::Ascii(v) => v.join(&0),
            FieldValue::Long(v) => v
                .iter()
                .flat_map(|x| match order {
                    ByteOrder::Little => x.to_le_bytes(),
                    ByteOrder::Big => x.to_be_bytes(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

/// Decode an EXIF UserComment: 8-byte character code followed by the text.
fn decode_user_comment(bytes: &[u8]) -> Option<String> {
    if bytes.len() < 8 {
        return None;
    }
    let (code, body) = bytes.split_at(8);
    match code {
        b"ASCII\0\0\0" | b"\0\0\0\0\0\0\0\0" | b"JIS\0\0\0\0\0" => {
            Some(String::from_utf8_lossy(body).into_owned())
        }
        b"UNICODE\0" => {
            if body.starts_with(&[0xFE, 0xFF]) {
                let units: Vec<u16> = body[2..]
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                Some(String::from_utf16_lossy(&units))
            } else {
                let body = body.strip_prefix(&[0xFF, 0xFE]).unwrap_or(body);
                Some(decode_utf16le(body))
            }
        }
        _ => None,
    }
}

/// The decoded metadata container of one image file.
///
/// Mirrors the native addressing of the binary container: each [`Segment`]
/// maps field ids to typed values. XMP and IPTC payloads ride alongside.
/// A container is built fresh for every call and never shared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawContainer {
    byte_order: ByteOrder,
    segments: BTreeMap<Segment, BTreeMap<u16, FieldValue>>,
    thumbnail: Option<Vec<u8>>,
    xmp: Option<String>,
    iptc: Option<IptcBlock>,
}

impl RawContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub(crate) fn set_byte_order(&mut self, order: ByteOrder) {
        self.byte_order = order;
    }

    pub fn get(&self, segment: Segment, tag: u16) -> Option<&FieldValue> {
        self.segments.get(&segment)?.get(&tag)
    }

    pub fn set(&mut self, segment: Segment, tag: u16, value: FieldValue) {
        self.segments.entry(segment).or_default().insert(tag, value);
    }

    pub fn remove(&mut self, segment: Segment, tag: u16) -> Option<FieldValue> {
        let fields = self.segments.get_mut(&segment)?;
        let removed = fields.remove(&tag);
        if fields.is_empty() {
            self.segments.remove(&segment);
        }
        removed
    }

    /// All fields of a segment, in ascending tag order.
    pub fn segment(&self, segment: Segment) -> Option<&BTreeMap<u16, FieldValue>> {
        self.segments.get(&segment).filter(|f| !f.is_empty())
    }

    pub fn has_ifd_fields(&self) -> bool {
        self.segments.values().any(|f| !f.is_empty()) || self.thumbnail.is_some()
    }

    pub fn thumbnail(&self) -> Option<&[u8]> {
        self.thumbnail.as_deref()
    }

    pub(crate) fn set_thumbnail(&mut self, data: Option<Vec<u8>>) {
        self.thumbnail = data;
    }

    pub fn xmp(&self) -> Option<&str> {
        self.xmp.as_deref()
    }

    pub fn set_xmp(&mut self, xmp: Option<String>) {
        self.xmp = xmp;
    }

    pub fn iptc(&self) -> Option<&IptcBlock> {
        self.iptc.as_ref()
    }

    pub fn set_iptc(&mut self, iptc: Option<IptcBlock>) {
        self.iptc = iptc;
    }

    pub fn is_empty(&self) -> bool {
        !self.has_ifd_fields()
            && self.xmp.is_none()
            && self.iptc.as_ref().is_none_or(|b| b.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_value_round_trips_text() {
        let value = FieldValue::utf16("sunset; beach");
        assert!(matches!(value, FieldValue::Byte(_)));
        assert_eq!(value.as_utf16_text().as_deref(), Some("sunset; beach"));
    }

    #[test]
    fn ascii_text_strips_terminator() {
        assert_eq!(FieldValue::ascii("Canon").as_text().as_deref(), Some("Canon"));
        assert_eq!(FieldValue::Ascii(vec![b"  ".to_vec()]).as_text(), None);
    }

    #[test]
    fn user_comment_prefixes() {
        let mut ascii = b"ASCII\0\0\0".to_vec();
        ascii.extend_from_slice(b"a,b");
        assert_eq!(FieldValue::Undefined(ascii).as_text().as_deref(), Some("a,b"));

        let mut unicode = b"UNICODE\0".to_vec();
        unicode.extend("tree".encode_utf16().flat_map(|c| c.to_le_bytes()));
        assert_eq!(FieldValue::Undefined(unicode).as_text().as_deref(), Some("tree"));

        assert_eq!(FieldValue::Undefined(b"odd".to_vec()).as_text(), None);
    }

    #[test]
    fn rational_with_zero_denominator_has_no_number() {
        assert_eq!(FieldValue::Rational(vec![(28, 10)]).as_f64(), Some(2.8));
        assert_eq!(FieldValue::Rational(vec![(1, 0)]).as_f64(), None);
    }

    #[test]
    fn embedded_payload_bytes_follow_byte_order() {
        let value = FieldValue::Long(vec![0x0102_0304]);
        assert_eq!(value.as_bytes(ByteOrder::Little), vec![4, 3, 2, 1]);
        assert_eq!(value.as_bytes(ByteOrder::Big), vec![1, 2, 3, 4]);
        assert_eq!(FieldValue::Byte(b"<x/>".to_vec()).as_bytes(ByteOrder::Big), b"<x/>");
    }

    #[test]
    fn removing_last_field_drops_segment() {
        let mut container = RawContainer::new();
        container.set(Segment::Primary, 0x4746, FieldValue::Short(vec![3]));
        assert!(!container.is_empty());
        container.remove(Segment::Primary, 0x4746);
        assert!(container.segment(Segment::Primary).is_none());
        assert!(container.is_empty());
    }
}
