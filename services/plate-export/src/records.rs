use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A single license plate detection produced upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlateDetectionRecord {
    /// Name of the image the plate was read from
    pub file_name: String,
    /// Recognized plate text
    pub license_plate_text: String,
    /// When the detection was captured
    pub timestamp: DateTime<Utc>,
}

impl PlateDetectionRecord {
    pub fn new(
        file_name: impl Into<String>,
        license_plate_text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            license_plate_text: license_plate_text.into(),
            timestamp,
        }
    }
}

/// Flat CSV projection of a [`PlateDetectionRecord`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExportRow {
    pub file_name: String,
    pub license_plate_text: String,
    pub time_stamp: String,
}

impl ExportRow {
    /// Column names, in the order fields are written
    pub const HEADERS: [&'static str; 3] = ["FileName", "LicensePlateText", "TimeStamp"];
}

impl From<&PlateDetectionRecord> for ExportRow {
    fn from(record: &PlateDetectionRecord) -> Self {
        Self {
            file_name: record.file_name.clone(),
            license_plate_text: record.license_plate_text.clone(),
            time_stamp: format_timestamp(&record.timestamp),
        }
    }
}

/// RFC 3339 in UTC with a `Z` suffix; fractional seconds only when present
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
