use crate::error::{AppError, Result};
use crate::gateway::RecordStore;
use crate::types::{IngestReport, InsertResult, ProductionRecord, REQUIRED_COLUMNS};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// A parsed upload: header row plus one record per data row, in file order.
#[derive(Debug, Clone)]
pub struct CsvUpload {
    pub headers: Vec<String>,
    pub rows: Vec<ProductionRecord>,
}

/// Parse the whole file before anything is written, so a malformed file
/// never leaves a partial upload behind.
pub fn parse_csv<R: Read>(reader: R) -> Result<CsvUpload> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| AppError::Parse(e.to_string()))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let raw = result.map_err(|e| AppError::Parse(e.to_string()))?;
        let mut record = ProductionRecord::default();
        // Short rows leave their trailing fields absent.
        for (column, value) in headers.iter().zip(raw.iter()) {
            record.set_field(column, value.to_string());
        }
        rows.push(record);
    }
    Ok(CsvUpload { headers, rows })
}

/// Required columns absent from `headers`, in the documented order.
pub fn missing_columns(headers: &[String]) -> Vec<String> {
    REQUIRED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .map(|col| col.to_string())
        .collect()
}

/// Validate and upload a CSV, one insert at a time.
///
/// Each insert is awaited before the next starts; a failed row is counted
/// and the loop moves on.
pub async fn ingest<R: Read>(store: &dyn RecordStore, reader: R) -> Result<IngestReport> {
    let upload = parse_csv(reader)?;
    let missing = missing_columns(&upload.headers);
    if !missing.is_empty() {
        warn!("upload rejected, missing columns: {}", missing.join(", "));
        return Err(AppError::Validation { missing });
    }

    info!("uploading {} rows", upload.rows.len());
    let mut report = IngestReport::default();
    for (idx, row) in upload.rows.iter().enumerate() {
        report.attempted += 1;
        let result = store.insert_one(row).await;
        if result.success {
            report.succeeded += 1;
        } else {
            report.failed += 1;
            warn!("row {} was not registered", idx + 1);
        }
    }
    info!(
        "upload finished: {} ok, {} failed",
        report.succeeded, report.failed
    );
    Ok(report)
}

pub async fn ingest_file<P: AsRef<Path>>(store: &dyn RecordStore, path: P) -> Result<IngestReport> {
    let file = File::open(path)?;
    ingest(store, file).await
}

/// Every field of a hand-entered record must be filled in.
pub fn check_required_fields(record: &ProductionRecord) -> Result<()> {
    let missing: Vec<String> = record
        .fields()
        .iter()
        .filter(|(_, value)| value.map_or(true, |v| v.trim().is_empty()))
        .map(|(column, _)| column.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation { missing })
    }
}

/// Submit the registration form.
pub async fn register(store: &dyn RecordStore, record: &ProductionRecord) -> Result<InsertResult> {
    check_required_fields(record)?;
    Ok(store.insert_one(record).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::{record, MemoryStore};

    const HEADER: &str = "departamento,tecnologia,produccion_mwh,fecha,año,mes,día";

    fn csv(body: &[&str]) -> String {
        let mut text = String::from(HEADER);
        for line in body {
            text.push('\n');
            text.push_str(line);
        }
        text
    }

    #[tokio::test]
    async fn one_failed_row_does_not_stop_the_upload() {
        let store = MemoryStore::failing_at(vec![1]);
        let data = csv(&[
            "Cesar,Solar,10.5,2024-01-01,2024,1,1",
            "Guajira,Eólica,20,2024-01-02,2024,1,2",
            "Meta,Biomasa,5,2024-01-03,2024,1,3",
        ]);

        let report = ingest(&store, data.as_bytes()).await.unwrap();
        assert_eq!(report, IngestReport { attempted: 3, succeeded: 2, failed: 1 });
        assert_eq!(store.attempts(), 3);

        let inserted = store.inserted.lock().unwrap();
        let departments: Vec<_> = inserted.iter().map(|r| r.department.clone().unwrap()).collect();
        assert_eq!(departments, vec!["Cesar", "Meta"]);
        assert_eq!(inserted[0].production_mwh.as_deref(), Some("10.5"));
        assert_eq!(inserted[1].day.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn missing_column_aborts_before_any_write() {
        let store = MemoryStore::default();
        let data = "departamento,tecnologia,produccion_mwh,año,mes,día\nCesar,Solar,1,2024,1,1";

        let err = ingest(&store, data.as_bytes()).await.unwrap_err();
        match err {
            AppError::Validation { missing } => assert_eq!(missing, vec!["fecha"]),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.attempts(), 0);
    }

    #[tokio::test]
    async fn malformed_file_aborts_before_any_write() {
        let store = MemoryStore::default();
        let mut data = csv(&["Cesar,Solar,1,2024-01-01,2024,1,1"]).into_bytes();
        data.extend_from_slice(b"\nMeta,\xff\xfe,1,2024-01-01,2024,1,1");

        let err = ingest(&store, data.as_slice()).await.unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));
        assert_eq!(store.attempts(), 0);
    }

    #[test]
    fn extra_columns_and_blank_lines_are_tolerated() {
        let data = "id,departamento,tecnologia,produccion_mwh,fecha,año,mes,día\n\n7,Cesar,Solar,3,2024-05-01,2024,5,1\n";
        let upload = parse_csv(data.as_bytes()).unwrap();
        assert!(missing_columns(&upload.headers).is_empty());
        assert_eq!(upload.rows.len(), 1);
        assert_eq!(upload.rows[0].department.as_deref(), Some("Cesar"));
        assert_eq!(upload.rows[0].month.as_deref(), Some("5"));
    }

    #[test]
    fn short_rows_leave_trailing_fields_absent() {
        let upload = parse_csv(csv(&["Cesar,Solar,3"]).as_bytes()).unwrap();
        let row = &upload.rows[0];
        assert_eq!(row.production_mwh.as_deref(), Some("3"));
        assert_eq!(row.date, None);
        assert_eq!(row.day, None);
    }

    #[test]
    fn missing_columns_keeps_required_order() {
        let headers = vec!["mes".to_string(), "tecnologia".to_string()];
        assert_eq!(
            missing_columns(&headers),
            vec!["departamento", "produccion_mwh", "fecha", "año", "día"]
        );
    }

    #[tokio::test]
    async fn register_requires_every_field() {
        let store = MemoryStore::default();
        let mut rec = record("Cesar", "Solar", "12", "2024-03-09");
        rec.technology = Some("  ".to_string());
        rec.day = None;

        let err = register(&store, &rec).await.unwrap_err();
        match err {
            AppError::Validation { missing } => assert_eq!(missing, vec!["tecnologia", "día"]),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.attempts(), 0);

        let ok = register(&store, &record("Cesar", "Solar", "12", "2024-03-09")).await.unwrap();
        assert!(ok.success);
        assert_eq!(store.attempts(), 1);
    }
}
