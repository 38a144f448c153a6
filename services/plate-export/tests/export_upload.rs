use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use plate_export::{
    to_csv_bytes, BlobNaming, BlobStore, BlobUpload, ContainerStatus, ExportError, Exporter,
    PlateDetectionRecord,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

/// In-memory blob store recording every call
#[derive(Default)]
struct MemoryStore {
    containers: Mutex<HashSet<String>>,
    blobs: Mutex<BTreeMap<(String, String), Vec<u8>>>,
    create_calls: Mutex<usize>,
    fail_uploads: bool,
}

impl MemoryStore {
    fn with_container(name: &str) -> Self {
        let store = Self::default();
        store.containers.lock().unwrap().insert(name.to_string());
        store
    }

    fn blob(&self, container: &str, name: &str) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .get(&(container.to_string(), name.to_string()))
            .cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn ensure_container(&self, container: &str) -> Result<ContainerStatus, ExportError> {
        let mut containers = self.containers.lock().unwrap();
        if containers.insert(container.to_string()) {
            *self.create_calls.lock().unwrap() += 1;
            Ok(ContainerStatus::Created)
        } else {
            Ok(ContainerStatus::Existing)
        }
    }

    async fn put_blob(&self, container: &str, upload: BlobUpload) -> Result<(), ExportError> {
        if self.fail_uploads {
            return Err(ExportError::Upload {
                blob: upload.name,
                message: "connection reset".to_string(),
            });
        }
        assert!(
            self.containers.lock().unwrap().contains(container),
            "upload before container exists"
        );
        self.blobs
            .lock()
            .unwrap()
            .insert((container.to_string(), upload.name), upload.body);
        Ok(())
    }
}

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
}

fn parse_rows(bytes: &[u8]) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers = reader
        .headers()
        .unwrap()
        .iter()
        .map(String::from)
        .collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    (headers, rows)
}

#[tokio::test]
async fn test_export_creates_container_and_uploads_csv() {
    let store = Arc::new(MemoryStore::default());
    let exporter = Exporter::new(store.clone(), "plates", BlobNaming::Timestamp)
        .with_clock(|| Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());

    let records = vec![PlateDetectionRecord::new("a.jpg", "ABC123", at(0, 0, 0))];
    assert!(exporter.export_and_upload(&records).await);

    let body = store.blob("plates", "2024-01-02T03:04:05.csv").unwrap();
    assert_eq!(
        String::from_utf8(body).unwrap(),
        "FileName,LicensePlateText,TimeStamp\na.jpg,ABC123,2024-01-01T00:00:00Z\n"
    );
    assert_eq!(*store.create_calls.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_existing_container_is_reused() {
    let store = Arc::new(MemoryStore::with_container("plates"));
    let exporter = Exporter::new(store.clone(), "plates", BlobNaming::Timestamp);

    let receipt = exporter.try_export_and_upload(&[]).await.unwrap();

    assert_eq!(receipt.container_status, ContainerStatus::Existing);
    assert_eq!(receipt.row_count, 0);
    assert_eq!(*store.create_calls.lock().unwrap(), 0);
    assert_eq!(
        store.blob("plates", &receipt.blob_name).unwrap(),
        b"FileName,LicensePlateText,TimeStamp\n"
    );
}

#[tokio::test]
async fn test_failed_upload_reports_false() {
    let store = Arc::new(MemoryStore {
        fail_uploads: true,
        ..MemoryStore::default()
    });
    let exporter = Exporter::new(store.clone(), "plates", BlobNaming::Timestamp);

    let records = vec![PlateDetectionRecord::new("a.jpg", "ABC123", at(0, 0, 0))];
    assert!(!exporter.export_and_upload(&records).await);
    assert!(store.blobs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_same_second_exports_overwrite_by_default() {
    let store = Arc::new(MemoryStore::default());
    let clock = || Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let exporter = Exporter::new(store.clone(), "plates", BlobNaming::Timestamp).with_clock(clock);

    assert!(exporter
        .export_and_upload(&[PlateDetectionRecord::new("1.jpg", "ONE", at(1, 0, 0))])
        .await);
    assert!(exporter
        .export_and_upload(&[PlateDetectionRecord::new("2.jpg", "TWO", at(2, 0, 0))])
        .await);

    let blobs = store.blobs.lock().unwrap();
    assert_eq!(blobs.len(), 1);
    let body = blobs.values().next().unwrap();
    assert!(String::from_utf8_lossy(body).contains("2.jpg,TWO"));
}

#[tokio::test]
async fn test_suffixed_names_keep_same_second_exports() {
    let store = Arc::new(MemoryStore::default());
    let clock = || Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let exporter =
        Exporter::new(store.clone(), "plates", BlobNaming::TimestampWithSuffix).with_clock(clock);

    assert!(exporter.export_and_upload(&[]).await);
    assert!(exporter.export_and_upload(&[]).await);

    let blobs = store.blobs.lock().unwrap();
    assert_eq!(blobs.len(), 2);
    assert!(blobs
        .keys()
        .all(|(_, name)| name.starts_with("2024-06-01T12:00:00-")));
}

#[test]
fn test_rows_round_trip_in_input_order() {
    let records: Vec<PlateDetectionRecord> = (0..25)
        .map(|i| {
            PlateDetectionRecord::new(
                format!("cam/{i:03}.jpg"),
                format!("PL{i}"),
                at(i / 60, i % 60, i),
            )
        })
        .collect();

    let (headers, rows) = parse_rows(&to_csv_bytes(&records).unwrap());

    assert_eq!(headers, ["FileName", "LicensePlateText", "TimeStamp"]);
    assert_eq!(rows.len(), records.len());
    for (row, record) in rows.iter().zip(&records) {
        assert_eq!(row[0], record.file_name);
        assert_eq!(row[1], record.license_plate_text);
        assert_eq!(
            row[2].parse::<DateTime<Utc>>().unwrap(),
            record.timestamp
        );
    }
}

#[test]
fn test_special_characters_survive_reparse() {
    let awkward = [
        ("lot A, row 3.jpg", "AB,12"),
        ("say \"cheese\".jpg", "\"Q\"UOTE"),
        ("multi\nline.jpg", "LINE\r\nBREAK"),
        ("  padded  .jpg", ""),
    ];
    let records: Vec<PlateDetectionRecord> = awkward
        .iter()
        .map(|(file, plate)| PlateDetectionRecord::new(*file, *plate, at(8, 30, 0)))
        .collect();

    let (_, rows) = parse_rows(&to_csv_bytes(&records).unwrap());

    assert_eq!(rows.len(), awkward.len());
    for (row, (file, plate)) in rows.iter().zip(awkward) {
        assert_eq!(row[0], file);
        assert_eq!(row[1], plate);
        assert_eq!(row[2], "2024-01-01T08:30:00Z");
    }
}
