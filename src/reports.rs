use crate::error::Result;
use crate::gateway::RecordStore;
use crate::layout::build_report;
use crate::output::{render_pdf, report_file_name, write_pdf};
use crate::types::{ProductionRecord, ReportResult, Statistics};
use crate::util::{average, non_empty, parse_f64_safe};
use chrono::{DateTime, Local};
use linked_hash_map::LinkedHashMap;
use std::path::Path;
use tracing::info;

/// Production of a record, zero when missing or not a number.
pub fn production_of(r: &ProductionRecord) -> f64 {
    parse_f64_safe(r.production_mwh.as_deref()).unwrap_or(0.0)
}

fn add_to(map: &mut LinkedHashMap<String, f64>, key: &str, value: f64) {
    *map.entry(key.to_string()).or_insert(0.0) += value;
}

fn push_distinct(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Summary figures and group-by sums over the whole record set.
///
/// Groups keep first-occurrence order; records without a key are left out
/// of that group but still count towards the totals.
pub fn aggregate(data: &[ProductionRecord]) -> Statistics {
    if data.is_empty() {
        return Statistics::default();
    }

    let productions: Vec<f64> = data.iter().map(production_of).collect();
    let mut stats = Statistics {
        total_records: data.len(),
        total_production: productions.iter().sum(),
        average_production: average(&productions),
        ..Default::default()
    };

    for (r, &mwh) in data.iter().zip(&productions) {
        if let Some(dept) = non_empty(r.department.as_deref()) {
            push_distinct(&mut stats.departments, dept);
            add_to(&mut stats.production_by_department, dept, mwh);
        }
        if let Some(tech) = non_empty(r.technology.as_deref()) {
            push_distinct(&mut stats.technologies, tech);
            add_to(&mut stats.production_by_technology, tech, mwh);
        }
        if let Some(month) = non_empty(r.month.as_deref()) {
            add_to(&mut stats.production_by_month, month, mwh);
        }
    }
    stats
}

/// Fetch everything and aggregate it.
pub async fn load_statistics(store: &dyn RecordStore) -> Result<(Vec<ProductionRecord>, Statistics)> {
    let records = store.fetch_all().await?;
    let stats = aggregate(&records);
    Ok((records, stats))
}

/// Build the PDF report and write it into `out_dir`.
///
/// Any failure is returned as-is; the file is only created once the whole
/// document has been rendered.
pub async fn generate_report(
    store: &dyn RecordStore,
    out_dir: &Path,
    now: DateTime<Local>,
) -> Result<ReportResult> {
    let (records, stats) = load_statistics(store).await?;
    let doc = build_report(&stats, &records, &now);
    let bytes = render_pdf(&doc)?;
    let file_name = report_file_name(now.date_naive());
    write_pdf(&out_dir.join(&file_name), &bytes)?;
    info!(
        "report {} written: {} pages, {} records",
        file_name,
        doc.page_count(),
        stats.total_records
    );
    Ok(ReportResult { success: true, file_name })
}
