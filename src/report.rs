//! # Report Aggregator Module
//!
//! Costruisce il report leggibile a partire dagli audit log.
//! Nessuna cache: il report viene ricalcolato ad ogni richiesta.

use crate::{audit_log::AuditLogReader, status_record::StatusRecord};
use serde::Serialize;
use std::path::Path;

/// Display format of `date_nice`
pub const DATE_NICE_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// One report row: the record plus its human-readable date
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    #[serde(flatten)]
    pub record: StatusRecord,
    pub date_nice: String,
}

impl From<StatusRecord> for ReportRow {
    fn from(record: StatusRecord) -> Self {
        let date_nice = record.change_date.format(DATE_NICE_FORMAT).to_string();
        Self { record, date_nice }
    }
}

pub struct ReportAggregator;

impl ReportAggregator {
    /// Rows for every valid record below `root`, oldest first
    pub async fn build(root: &Path) -> Vec<ReportRow> {
        Self::from_records(AuditLogReader::generate(root).await)
    }

    pub fn from_records(records: Vec<StatusRecord>) -> Vec<ReportRow> {
        let mut rows: Vec<ReportRow> = records.into_iter().map(ReportRow::from).collect();
        rows.sort_by_key(|row| row.record.change_date);
        rows
    }
}
