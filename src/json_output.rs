//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per l'uso programmatico.
//!
//! ## Responsabilità:
//! - Emette messaggi JSON, uno per riga, su stdout
//! - Riusa `ReportRow` e `RunSummary` senza duplicarne i campi
//!
//! ## Tipi di messaggi:
//! - `report_row`: Una riga del report degli audit log
//! - `complete`: Fine del run con il riepilogo
//! - `api_status`: Stato dell'account della API key
//! - `error`: Errore che ha interrotto il run

use crate::{progress::RunSummary, provider::ApiStatus, report::ReportRow};
use serde::Serialize;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum JsonMessage<'a> {
    #[serde(rename = "report_row")]
    ReportRow(&'a ReportRow),

    #[serde(rename = "complete")]
    Complete(&'a RunSummary),

    #[serde(rename = "api_status")]
    ApiStatus(&'a ApiStatus),

    #[serde(rename = "error")]
    Error { message: String, fatal: bool },
}

impl JsonMessage<'_> {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }
}
