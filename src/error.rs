//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `OptimizeError` enum per categorizzare tutti gli errori possibili
//! - Definisce `ProviderError` per i fallimenti del provider esterno
//! - Distingue gli errori fatali (abort del run) da quelli "log and continue"
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `Io`: Root folder non risolvibile (inesistente, permessi, etc.)
//! - `Json`: RunState non serializzabile
//! - `State`: Lettura/scrittura del record di stato fallita
//! - `MissingCredential`: Variabile d'ambiente con la API key assente
//! - `Validation`: Root folder che non è una directory
//! - `ProviderAborted`: Fallimento della chiamata al provider (fatale)
//!
//! Gli errori dell'asset store restano `anyhow`: il repair li logga per file
//! e il loop continua, non risalgono mai fino al run.
//!
//! ## Errori fatali:
//! `is_fatal()` identifica gli errori che il main converte in terminazione
//! immediata del processo, senza alcun passo successivo.
//!
//! ## Esempio:
//! ```rust,ignore
//! if api_key.is_empty() {
//!     return Err(OptimizeError::MissingCredential("SP_APIKEY".to_string()));
//! }
//! ```

/// Failures reported by the external optimization provider
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("Failed to start provider: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Provider did not finish within {0} seconds")]
    Timeout(u64),

    #[error("Provider failed (code {code}): {message}")]
    Failed { code: i32, message: String },

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Custom error types for folder optimization
#[derive(thiserror::Error, Debug)]
pub enum OptimizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("State error: {0}")]
    State(String),

    #[error("Env '{0}' not set")]
    MissingCredential(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Provider call aborted: {0}")]
    ProviderAborted(#[from] ProviderError),
}

impl OptimizeError {
    /// True when the run must terminate the process instead of continuing
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ProviderAborted(_) | Self::MissingCredential(_))
    }
}
