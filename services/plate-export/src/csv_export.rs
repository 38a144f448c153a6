use crate::error::ExportError;
use crate::records::{ExportRow, PlateDetectionRecord};
use chrono::{DateTime, Utc};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::Deserialize;
use uuid::Uuid;

/// Content type attached to uploaded exports
pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

/// How export blobs are named
///
/// Both strategies start with the UTC time at second precision so that blob
/// listings sort chronologically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobNaming {
    /// `2024-01-02T03:04:05.csv`; a second export in the same second overwrites the first
    #[default]
    Timestamp,
    /// `2024-01-02T03:04:05-<uuid>.csv`
    TimestampWithSuffix,
}

/// Build the blob name for an export started at `now`
pub fn blob_name(now: DateTime<Utc>, naming: BlobNaming) -> String {
    let stamp = now.format("%Y-%m-%dT%H:%M:%S");

    match naming {
        BlobNaming::Timestamp => format!("{stamp}.csv"),
        BlobNaming::TimestampWithSuffix => {
            format!("{stamp}-{suffix}.csv", suffix = Uuid::new_v4().simple())
        }
    }
}

/// Serialize records to CSV bytes, header first, rows in input order
pub fn to_csv_bytes(records: &[PlateDetectionRecord]) -> Result<Vec<u8>, ExportError> {
    // Rough guess: three short fields and a timestamp per row
    let capacity = 64 + records.len() * 64;
    let mut writer = WriterBuilder::new()
        .delimiter(b',')
        .has_headers(false)
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::with_capacity(capacity));

    // Written explicitly so an empty export still carries the header row
    writer.write_record(ExportRow::HEADERS)?;

    for record in records {
        writer.serialize(ExportRow::from(record))?;
    }

    writer
        .into_inner()
        .map_err(|e| ExportError::Buffer(e.to_string()))
}
