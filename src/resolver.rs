//! Locates the caller-relevant values among overlapping metadata fields.
//!
//! Every lookup walks a fixed, priority-ordered list of typed accessors and
//! takes the first one that yields a value. Nothing here performs I/O.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::exif::tags::*;
use crate::exif::{FieldValue, RawContainer, Segment, xmp};
use crate::record::CameraInfo;

/// A candidate tag value as stored: already a list, or one string to split.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    List(Vec<String>),
    Text(String),
}

type TagAccessor = fn(&RawContainer) -> Option<TagValue>;

/// Tag candidates, highest priority first.
pub const TAG_CANDIDATES: &[(&str, TagAccessor)] = &[
    ("IPTC:Keywords", |c| list(c.iptc()?.keywords())),
    ("XMP:dc:subject", |c| list(xmp::bag(c.xmp()?, xmp::DC_SUBJECT))),
    ("EXIF:XPKeywords", |c| utf16_field(c, TAG_XP_KEYWORDS)),
    ("EXIF:XPComment", |c| utf16_field(c, TAG_XP_COMMENT)),
    ("EXIF:XPSubject", |c| utf16_field(c, TAG_XP_SUBJECT)),
    ("EXIF:ImageDescription", |c| text_field(c, Segment::Primary, TAG_IMAGE_DESCRIPTION)),
    ("EXIF:UserComment", |c| text_field(c, Segment::Exif, TAG_USER_COMMENT)),
    ("XMP:lr:hierarchicalSubject", |c| list(xmp::bag(c.xmp()?, xmp::LR_HIERARCHICAL_SUBJECT))),
];

fn list(items: Vec<String>) -> Option<TagValue> {
    let items: Vec<String> = items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() { None } else { Some(TagValue::List(items)) }
}

fn utf16_field(container: &RawContainer, tag: u16) -> Option<TagValue> {
    container
        .get(Segment::Primary, tag)?
        .as_utf16_text()
        .map(TagValue::Text)
}

fn text_field(container: &RawContainer, segment: Segment, tag: u16) -> Option<TagValue> {
    container.get(segment, tag)?.as_text().map(TagValue::Text)
}

const SEPARATORS: [char; 4] = [';', ',', '|', '\n'];

/// Split a free-text tag field on the first separator that occurs in it.
pub fn split_tags(text: &str) -> Vec<String> {
    match SEPARATORS.iter().find(|&&sep| text.contains(sep)) {
        Some(&sep) => text
            .split(sep)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        None => vec![text.trim().to_string()],
    }
}

fn dedupe(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter().filter(|t| seen.insert(t.clone())).collect()
}

/// Tags from the highest-priority non-empty candidate field. Lower-priority
/// fields are never merged in.
pub fn resolve_tags(container: &RawContainer) -> Vec<String> {
    for (name, accessor) in TAG_CANDIDATES {
        if let Some(value) = accessor(container) {
            log::debug!("Tags resolved from {name}");
            let tags = match value {
                TagValue::List(items) => items,
                TagValue::Text(text) => split_tags(&text),
            };
            return dedupe(tags);
        }
    }
    Vec::new()
}

/// Star rating from EXIF Rating, then XMP `xmp:Rating`. Absent or unparsable gives 0.
pub fn resolve_rating(container: &RawContainer) -> i32 {
    let exif = container
        .get(Segment::Primary, TAG_RATING)
        .and_then(FieldValue::as_f64)
        .map(|v| v as i32);
    exif.or_else(|| {
        container
            .xmp()
            .and_then(|x| xmp::property(x, xmp::XMP_RATING))
            .and_then(|s| parse_rating(&s))
    })
    .unwrap_or(0)
}

fn parse_rating(text: &str) -> Option<i32> {
    let text = text.trim();
    text.parse::<i32>()
        .ok()
        .or_else(|| text.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v as i32))
}

/// Capture time, if any date field parses.
pub fn resolve_date(container: &RawContainer) -> Option<DateTime<Utc>> {
    let offset = container
        .get(Segment::Exif, TAG_OFFSET_TIME_ORIGINAL)
        .and_then(FieldValue::as_text);
    let exif_date = |segment, tag, offset: Option<&str>| {
        container
            .get(segment, tag)
            .and_then(FieldValue::as_text)
            .and_then(|s| parse_exif_date(&s, offset))
    };

    exif_date(Segment::Exif, TAG_DATE_TIME_ORIGINAL, offset.as_deref())
        .or_else(|| exif_date(Segment::Exif, TAG_DATE_TIME_DIGITIZED, None))
        .or_else(|| exif_date(Segment::Primary, TAG_DATE_TIME, None))
        .or_else(|| {
            let xmp = container.xmp()?;
            parse_xmp_date(&xmp::property(xmp, xmp::XMP_CREATE_DATE)?)
        })
}

/// `YYYY:MM:DD HH:MM:SS`, local time shifted by `offset` (`+HH:MM`) when known.
fn parse_exif_date(text: &str, offset: Option<&str>) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Some(offset) = offset {
        let with_offset = format!("{text} {}", offset.trim());
        if let Ok(dt) = DateTime::parse_from_str(&with_offset, "%Y:%m:%d %H:%M:%S %:z") {
            return Some(dt.with_timezone(&Utc));
        }
    }
    NaiveDateTime::parse_from_str(text, "%Y:%m:%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// ISO 8601 in any of the precisions XMP allows.
fn parse_xmp_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Camera settings, present only when Make or Model is.
pub fn resolve_camera(container: &RawContainer) -> Option<CameraInfo> {
    let text = |segment, tag| container.get(segment, tag).and_then(FieldValue::as_text);
    let number = |tag| {
        container
            .get(Segment::Exif, tag)
            .and_then(FieldValue::as_f64)
            .filter(|v| *v > 0.0)
    };

    let make = text(Segment::Primary, TAG_MAKE);
    let model = text(Segment::Primary, TAG_MODEL);
    if make.is_none() && model.is_none() {
        return None;
    }

    Some(CameraInfo {
        make,
        model,
        lens: text(Segment::Exif, TAG_LENS_MODEL),
        aperture: number(TAG_F_NUMBER).map(|f| format!("f/{}", format_decimal(f))),
        shutter_speed: number(TAG_EXPOSURE_TIME).and_then(format_shutter),
        iso: number(TAG_ISO).map(|v| v as u32),
        focal_length: number(TAG_FOCAL_LENGTH).map(|f| format!("{}mm", format_decimal(f))),
    })
}

fn format_shutter(seconds: f64) -> Option<String> {
    if seconds >= 1.0 {
        return Some(format!("{}s", format_decimal(seconds)));
    }
    let denominator = (1.0 / seconds).round();
    if !denominator.is_finite() || denominator < 1.0 {
        return None;
    }
    Some(format!("1/{denominator}s"))
}

/// One decimal, without a trailing `.0`.
fn format_decimal(value: f64) -> String {
    let text = format!("{value:.1}");
    match text.strip_suffix(".0") {
        Some(whole) => whole.to_string(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif::IptcBlock;

    fn with_xp(tag: u16, text: &str) -> RawContainer {
        let mut c = RawContainer::new();
        c.set(Segment::Primary, tag, FieldValue::utf16(text));
        c
    }

    fn xmp_packet(body: &str) -> String {
        format!(
            "<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\
             <rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\
             <rdf:Description rdf:about=\"\">{body}</rdf:Description></rdf:RDF></x:xmpmeta>"
        )
    }

    #[test]
    fn separators_are_tried_in_order() {
        assert_eq!(split_tags("a;b;c"), vec!["a", "b", "c"]);
        assert_eq!(split_tags("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(split_tags("a, b; c"), vec!["a, b", "c"]);
        assert_eq!(split_tags("x|y"), vec!["x", "y"]);
        assert_eq!(split_tags("one\ntwo"), vec!["one", "two"]);
        assert_eq!(split_tags("whole string"), vec!["whole string"]);
    }

    #[test]
    fn highest_priority_field_wins_without_merging() {
        let mut c = with_xp(TAG_XP_KEYWORDS, "xp1;xp2");
        c.set(Segment::Primary, TAG_IMAGE_DESCRIPTION, FieldValue::ascii("desc"));
        c.set_xmp(Some(xmp_packet(
            "<dc:subject><rdf:Bag><rdf:li>sub1</rdf:li><rdf:li>sub2</rdf:li></rdf:Bag>\
             </dc:subject>",
        )));
        assert_eq!(resolve_tags(&c), vec!["sub1", "sub2"]);

        let mut iptc = IptcBlock::default();
        iptc.set_keywords(&["kw".to_string()]);
        c.set_iptc(Some(iptc));
        assert_eq!(resolve_tags(&c), vec!["kw"]);

        c.set_iptc(None);
        c.set_xmp(None);
        assert_eq!(resolve_tags(&c), vec!["xp1", "xp2"]);
    }

    #[test]
    fn every_candidate_in_priority_order() {
        let mut c = RawContainer::new();
        let mut iptc = IptcBlock::default();
        iptc.set_keywords(&["iptc".to_string()]);
        c.set_iptc(Some(iptc));
        c.set_xmp(Some(xmp_packet(
            "<dc:subject><rdf:Bag><rdf:li>subject</rdf:li></rdf:Bag></dc:subject>\
             <lr:hierarchicalSubject><rdf:Bag><rdf:li>hierarchy</rdf:li></rdf:Bag>\
             </lr:hierarchicalSubject>",
        )));
        c.set(Segment::Primary, TAG_XP_KEYWORDS, FieldValue::utf16("xp-keywords"));
        c.set(Segment::Primary, TAG_XP_COMMENT, FieldValue::utf16("xp-comment"));
        c.set(Segment::Primary, TAG_XP_SUBJECT, FieldValue::utf16("xp-subject"));
        c.set(Segment::Primary, TAG_IMAGE_DESCRIPTION, FieldValue::ascii("description"));
        let comment = FieldValue::Undefined(b"ASCII\0\0\0comment".to_vec());
        c.set(Segment::Exif, TAG_USER_COMMENT, comment);
        assert_eq!(TAG_CANDIDATES.len(), 8);

        assert_eq!(resolve_tags(&c), ["iptc"]);
        c.set_iptc(None);
        assert_eq!(resolve_tags(&c), ["subject"]);
        c.set_xmp(xmp::set_bag(c.xmp(), xmp::DC_SUBJECT, &[]));
        assert_eq!(resolve_tags(&c), ["xp-keywords"]);
        c.remove(Segment::Primary, TAG_XP_KEYWORDS);
        assert_eq!(resolve_tags(&c), ["xp-comment"]);
        c.remove(Segment::Primary, TAG_XP_COMMENT);
        assert_eq!(resolve_tags(&c), ["xp-subject"]);
        c.remove(Segment::Primary, TAG_XP_SUBJECT);
        assert_eq!(resolve_tags(&c), ["description"]);
        c.remove(Segment::Primary, TAG_IMAGE_DESCRIPTION);
        assert_eq!(resolve_tags(&c), ["comment"]);
        c.remove(Segment::Exif, TAG_USER_COMMENT);
        assert_eq!(resolve_tags(&c), ["hierarchy"]);
    }

    #[test]
    fn empty_candidates_fall_through() {
        let mut c = with_xp(TAG_XP_KEYWORDS, "");
        let comment = FieldValue::Undefined(b"ASCII\0\0\0red|blue|red".to_vec());
        c.set(Segment::Exif, TAG_USER_COMMENT, comment);
        assert_eq!(resolve_tags(&c), vec!["red", "blue"]);
    }

    #[test]
    fn hierarchical_subject_is_last_resort() {
        let mut c = RawContainer::new();
        c.set_xmp(Some(xmp_packet(
            "<lr:hierarchicalSubject><rdf:Bag><rdf:li>Places|Oslo</rdf:li></rdf:Bag>\
             </lr:hierarchicalSubject>",
        )));
        assert_eq!(resolve_tags(&c), vec!["Places|Oslo"]);
        assert!(resolve_tags(&RawContainer::new()).is_empty());
    }

    #[test]
    fn rating_sources() {
        let mut c = RawContainer::new();
        assert_eq!(resolve_rating(&c), 0);

        c.set_xmp(Some(xmp_packet("<xmp:Rating>4</xmp:Rating>")));
        assert_eq!(resolve_rating(&c), 4);

        c.set(Segment::Primary, TAG_RATING, FieldValue::Short(vec![2]));
        assert_eq!(resolve_rating(&c), 2);

        c.remove(Segment::Primary, TAG_RATING);
        c.set_xmp(Some(xmp_packet("<xmp:Rating>lots</xmp:Rating>")));
        assert_eq!(resolve_rating(&c), 0);
        assert_eq!(parse_rating("3.7"), Some(3));
        assert_eq!(parse_rating("-1"), Some(-1));
    }

    #[test]
    fn date_sources() {
        let mut c = RawContainer::new();
        assert!(resolve_date(&c).is_none());

        c.set(Segment::Primary, TAG_DATE_TIME, FieldValue::ascii("2020:01:02 03:04:05"));
        assert_eq!(resolve_date(&c).unwrap().to_rfc3339(), "2020-01-02T03:04:05+00:00");

        c.set(Segment::Exif, TAG_DATE_TIME_ORIGINAL, FieldValue::ascii("2021:06:07 12:00:00"));
        c.set(Segment::Exif, TAG_OFFSET_TIME_ORIGINAL, FieldValue::ascii("+02:00"));
        assert_eq!(resolve_date(&c).unwrap().to_rfc3339(), "2021-06-07T10:00:00+00:00");

        let mut x = RawContainer::new();
        x.set(Segment::Exif, TAG_DATE_TIME_ORIGINAL, FieldValue::ascii("0000:00:00 00:00:00"));
        x.set_xmp(Some(xmp_packet("<xmp:CreateDate>2019-03-04</xmp:CreateDate>")));
        assert_eq!(resolve_date(&x).unwrap().to_rfc3339(), "2019-03-04T00:00:00+00:00");
    }

    #[test]
    fn camera_info_formatting() {
        let mut c = RawContainer::new();
        c.set(Segment::Exif, TAG_F_NUMBER, FieldValue::Rational(vec![(28, 10)]));
        assert!(resolve_camera(&c).is_none());

        c.set(Segment::Primary, TAG_MAKE, FieldValue::ascii("Canon"));
        c.set(Segment::Exif, TAG_EXPOSURE_TIME, FieldValue::Rational(vec![(1, 250)]));
        c.set(Segment::Exif, TAG_ISO, FieldValue::Short(vec![400]));
        c.set(Segment::Exif, TAG_FOCAL_LENGTH, FieldValue::Rational(vec![(50, 1)]));
        c.set(Segment::Exif, TAG_LENS_MODEL, FieldValue::ascii("RF50mm F1.8 STM"));

        let info = resolve_camera(&c).unwrap();
        assert_eq!(info.make.as_deref(), Some("Canon"));
        assert_eq!(info.model, None);
        assert_eq!(info.aperture.as_deref(), Some("f/2.8"));
        assert_eq!(info.shutter_speed.as_deref(), Some("1/250s"));
        assert_eq!(info.iso, Some(400));
        assert_eq!(info.focal_length.as_deref(), Some("50mm"));
        assert_eq!(info.lens.as_deref(), Some("RF50mm F1.8 STM"));
    }

    #[test]
    fn bad_numbers_are_omitted() {
        let mut c = RawContainer::new();
        c.set(Segment::Primary, TAG_MODEL, FieldValue::ascii("X100V"));
        c.set(Segment::Exif, TAG_F_NUMBER, FieldValue::Rational(vec![(28, 0)]));
        c.set(Segment::Exif, TAG_EXPOSURE_TIME, FieldValue::Rational(vec![(0, 1)]));
        c.set(Segment::Exif, TAG_FOCAL_LENGTH, FieldValue::ascii("wide"));

        let info = resolve_camera(&c).unwrap();
        assert_eq!(info.aperture, None);
        assert_eq!(info.shutter_speed, None);
        assert_eq!(info.focal_length, None);
        assert_eq!(format_shutter(2.0).as_deref(), Some("2s"));
        assert_eq!(format_shutter(0.3).as_deref(), Some("1/3s"));
    }
}
