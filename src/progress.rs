//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e le statistiche di un run.
//!
//! ## Responsabilità:
//! - Progress bar visual con `indicatif` per il loop di repair
//! - Conteggio degli esiti di repair (healthy, recovered, not found, errori)
//! - Riepilogo finale del run (`RunSummary`)
//!
//! ## Componenti principali:
//! - `ProgressManager`: Gestisce la progress bar (nascosta se disabilitata)
//! - `RepairStats`: Esiti cumulativi di un loop di repair
//! - `RunSummary`: Conteggi del provider, recovery, repair e durata
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:03] [========================================] 10/10 (100%) Uploads/a.jpg: recovered
//! ```

use crate::optimizer::repairer::RepairOutcome;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

/// Manages progress reporting for a repair loop
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager; a hidden one draws nothing
    pub fn new(total_files: u64, visible: bool) -> Self {
        if !visible {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new(total_files);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Outcome counts of one repair loop
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct RepairStats {
    pub checked: usize,
    pub healthy: usize,
    pub recovered: usize,
    pub not_found: usize,
    pub errors: usize,
}

impl RepairStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, outcome: RepairOutcome) {
        self.checked += 1;
        match outcome {
            RepairOutcome::Healthy => self.healthy += 1,
            RepairOutcome::Recovered => self.recovered += 1,
            RepairOutcome::NotFound => self.not_found += 1,
        }
    }

    pub fn add_error(&mut self) {
        self.checked += 1;
        self.errors += 1;
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Checked: {} | Recovered: {} | Healthy: {} | Not found: {} | Errors: {}",
            self.checked, self.recovered, self.healthy, self.not_found, self.errors
        )
    }
}

/// What one orchestrator run did
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub status_code: i64,
    pub status_message: String,
    pub succeeded: usize,
    pub pending: usize,
    pub failed: usize,
    pub same: usize,
    pub recovery: Option<RepairStats>,
    pub repair: Option<RepairStats>,
    pub duration_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_stats() {
        let mut stats = RepairStats::new();
        stats.add(RepairOutcome::Recovered);
        stats.add(RepairOutcome::Healthy);
        stats.add(RepairOutcome::NotFound);
        stats.add_error();

        assert_eq!(stats.checked, 4);
        assert_eq!(stats.recovered, 1);
        assert_eq!(
            stats.format_summary(),
            "Checked: 4 | Recovered: 1 | Healthy: 1 | Not found: 1 | Errors: 1"
        );
    }

    #[test]
    fn test_hidden_progress_manager() {
        let progress = ProgressManager::new(3, false);
        progress.update("a.jpg: recovered");
        progress.finish("done");
    }
}
