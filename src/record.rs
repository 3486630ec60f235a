use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::exif::RawContainer;
use crate::resolver;

/// Canonical, format-agnostic metadata of one image.
///
/// Built fresh on every read; never cached.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    /// Deduplicated, in first-seen order.
    pub tags: Vec<String>,
    /// Star rating as stored. 0 when absent or unparsable; not clamped.
    pub rating: i32,
    pub date_created: DateTime<Utc>,
    pub camera_info: Option<CameraInfo>,
}

impl MetadataRecord {
    /// The record returned for files without readable metadata.
    pub fn empty() -> Self {
        Self {
            tags: Vec::new(),
            rating: 0,
            date_created: Utc::now(),
            camera_info: None,
        }
    }

    pub fn from_container(container: &RawContainer) -> Self {
        Self {
            tags: resolver::resolve_tags(container),
            rating: resolver::resolve_rating(container),
            date_created: resolver::resolve_date(container).unwrap_or_else(Utc::now),
            camera_info: resolver::resolve_camera(container),
        }
    }
}

/// Camera settings, preformatted for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    pub make: Option<String>,
    pub model: Option<String>,
    pub lens: Option<String>,
    /// e.g. `f/2.8`
    pub aperture: Option<String>,
    /// e.g. `1/250s` or `2s`
    pub shutter_speed: Option<String>,
    pub iso: Option<u32>,
    /// e.g. `50mm`
    pub focal_length: Option<String>,
}

/// Partial update applied by the writer. Absent fields are left as found on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<i32>,
}

impl MetadataPatch {
    pub fn tags(tags: Vec<String>) -> Self {
        Self { tags: Some(tags), rating: None }
    }

    pub fn rating(rating: i32) -> Self {
        Self { tags: None, rating: Some(rating) }
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_none() && self.rating.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_container_gives_default_record() {
        let before = Utc::now();
        let record = MetadataRecord::from_container(&RawContainer::new());
        assert!(record.tags.is_empty());
        assert_eq!(record.rating, 0);
        assert!(record.camera_info.is_none());
        assert!(record.date_created >= before);
    }

    #[test]
    fn record_serializes_camel_case() {
        let record = MetadataRecord {
            tags: vec!["a".into()],
            rating: 4,
            date_created: DateTime::from_timestamp(0, 0).unwrap(),
            camera_info: Some(CameraInfo { iso: Some(100), ..Default::default() }),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["dateCreated"], "1970-01-01T00:00:00Z");
        assert_eq!(json["cameraInfo"]["iso"], 100);
        assert_eq!(json["cameraInfo"]["shutterSpeed"], serde_json::Value::Null);
    }

    #[test]
    fn patch_constructors() {
        assert!(MetadataPatch::default().is_empty());
        assert_eq!(MetadataPatch::rating(3).rating, Some(3));
        assert!(!MetadataPatch::tags(Vec::new()).is_empty());
        let parsed: MetadataPatch = serde_json::from_str(r#"{"rating":2}"#).unwrap();
        assert_eq!(parsed, MetadataPatch::rating(2));
    }
}
