//! # Optimization Provider Module
//!
//! Questo modulo astrae il provider esterno che ottimizza le immagini.
//!
//! ## Responsabilità:
//! - Definisce il trait `OptimizationProvider` (submit → wait → collect)
//! - Definisce la richiesta (`BatchRequest`) e il risultato (`BatchResult`)
//! - Implementa `CommandProvider`, che delega a un programma esterno
//!
//! ## Architettura:
//! La compressione è opaca per l'orchestratore: come per gli altri tool
//! esterni, il lavoro vero viene fatto da un processo separato lanciato con
//! `tokio::process::Command`. Il programma riceve la configurazione come
//! argomenti, la API key in `SP_APIKEY`, e stampa il risultato JSON su stdout.
//!
//! ## Argomenti passati al programma:
//! ```text
//! --folder <root> --max-files <n> --body-size-limit <mb> --wait <secs>
//! [--exclude <name>]... [--option <key>=<value>]...
//! ```
//!
//! ## Formato del risultato:
//! ```json
//! {
//!   "status": {"code": 2, "message": "Folder completely optimized."},
//!   "succeeded": [{"OriginalFile": "/srv/assets/a.jpg"}],
//!   "pending": [], "failed": [], "same": []
//! }
//! ```
//!
//! ## Stato dell'account:
//! Con `--api-status` il programma stampa lo stato della API key (quota,
//! chiamate residue) come oggetto JSON, o come lista con lo stato in testa.
//!
//! ## Error handling:
//! Ogni errore qui è un `ProviderError`; l'orchestratore lo tratta come fatale.

use crate::{error::ProviderError, state::FileDescriptor};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::debug;

/// Parameters of one bounded provider call
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub folder: PathBuf,
    pub max_files: usize,
    pub exclude_folders: Vec<String>,
    pub body_size_limit: u32,
    pub wait: Duration,
}

/// Provider-level status of a finished call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchStatus {
    pub code: i64,
    pub message: String,
}

/// Per-file outcome lists of a finished call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchResult {
    pub status: BatchStatus,
    pub succeeded: Vec<FileDescriptor>,
    pub pending: Vec<FileDescriptor>,
    pub failed: Vec<FileDescriptor>,
    pub same: Vec<FileDescriptor>,
}

impl BatchResult {
    /// Succeeded and pending files, both candidates for store repair
    pub fn manipulated_files(&self) -> Vec<FileDescriptor> {
        self.succeeded
            .iter()
            .chain(self.pending.iter())
            .cloned()
            .collect()
    }
}

/// Key of the message a failed status query carries
pub const API_STATUS_ERROR_KEY: &str = "Error";

/// Timeout of an account status query
pub const API_STATUS_TIMEOUT: Duration = Duration::from_secs(30);

/// Account and quota status of the API key, as the provider reports it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiStatus {
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl ApiStatus {
    /// A status holding only an error message
    pub fn from_error(message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(
            API_STATUS_ERROR_KEY.to_string(),
            serde_json::Value::String(message.into()),
        );
        Self { fields }
    }

    pub fn error(&self) -> Option<&str> {
        self.fields.get(API_STATUS_ERROR_KEY).and_then(|v| v.as_str())
    }

    /// `key: value` for every textual field
    pub fn lines(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter_map(|(key, value)| value.as_str().map(|v| format!("{}: {}", key, v)))
            .collect()
    }

    /// Parse a status object, or a list whose first element is the status
    pub fn parse(bytes: &[u8]) -> Result<Self, ProviderError> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let value = match value {
            serde_json::Value::Array(items) => items
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::InvalidResponse("empty api status".to_string()))?,
            other => other,
        };

        serde_json::from_value(value).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

/// External optimization service invoked in bounded batches
#[async_trait]
pub trait OptimizationProvider: Send + Sync {
    type Job: Send;

    /// Account and quota status of the configured key
    async fn api_status(&self) -> Result<ApiStatus, ProviderError>;

    async fn submit(&self, request: &BatchRequest) -> Result<Self::Job, ProviderError>;

    async fn wait(&self, job: Self::Job, timeout: Duration) -> Result<Self::Job, ProviderError>;

    async fn collect_results(&self, job: Self::Job, folder: &Path) -> Result<BatchResult, ProviderError>;
}

/// A provider call running as a child process
pub enum CommandJob {
    Running(Child),
    Finished(Output),
}

/// Provider backed by an external program
pub struct CommandProvider {
    program: String,
    leading_args: Vec<String>,
    options: BTreeMap<String, String>,
    api_key: String,
}

impl CommandProvider {
    pub fn new(program: impl Into<String>, options: BTreeMap<String, String>, api_key: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            options,
            api_key: api_key.into(),
        }
    }

    /// Arguments placed before the batch arguments (e.g. a script path)
    pub fn with_leading_args(mut self, args: Vec<String>) -> Self {
        self.leading_args = args;
        self
    }

    fn spawn(&self, args: &[String]) -> Result<Child, ProviderError> {
        debug!("Running provider: {} {}", self.program, args.join(" "));

        Command::new(&self.program)
            .args(args)
            .env("SP_APIKEY", &self.api_key)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ProviderError::Spawn)
    }

    fn check_exit(output: &Output) -> Result<(), ProviderError> {
        if output.status.success() {
            return Ok(());
        }

        Err(ProviderError::Failed {
            code: output.status.code().unwrap_or(-1),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// Command line for one batch
    pub fn build_args(&self, request: &BatchRequest) -> Vec<String> {
        let mut args = self.leading_args.clone();
        args.extend([
            "--folder".to_string(),
            request.folder.to_string_lossy().into_owned(),
            "--max-files".to_string(),
            request.max_files.to_string(),
            "--body-size-limit".to_string(),
            request.body_size_limit.to_string(),
            "--wait".to_string(),
            request.wait.as_secs().to_string(),
        ]);

        for folder in &request.exclude_folders {
            args.push("--exclude".to_string());
            args.push(folder.clone());
        }

        for (key, value) in &self.options {
            args.push("--option".to_string());
            args.push(format!("{}={}", key, value));
        }

        args
    }
}

#[async_trait]
impl OptimizationProvider for CommandProvider {
    type Job = CommandJob;

    async fn api_status(&self) -> Result<ApiStatus, ProviderError> {
        let mut args = self.leading_args.clone();
        args.push("--api-status".to_string());

        let job = CommandJob::Running(self.spawn(&args)?);
        let output = match self.wait(job, API_STATUS_TIMEOUT).await? {
            CommandJob::Finished(output) => output,
            CommandJob::Running(_) => {
                return Err(ProviderError::InvalidResponse("status query still running".to_string()))
            }
        };

        Self::check_exit(&output)?;
        ApiStatus::parse(&output.stdout)
    }

    async fn submit(&self, request: &BatchRequest) -> Result<CommandJob, ProviderError> {
        let args = self.build_args(request);
        Ok(CommandJob::Running(self.spawn(&args)?))
    }

    async fn wait(&self, job: CommandJob, timeout: Duration) -> Result<CommandJob, ProviderError> {
        let child = match job {
            CommandJob::Running(child) => child,
            finished => return Ok(finished),
        };

        // Dropping the child on timeout kills it
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(CommandJob::Finished(output)),
            Ok(Err(e)) => Err(ProviderError::Failed {
                code: -1,
                message: e.to_string(),
            }),
            Err(_) => Err(ProviderError::Timeout(timeout.as_secs())),
        }
    }

    async fn collect_results(&self, job: CommandJob, folder: &Path) -> Result<BatchResult, ProviderError> {
        let output = match job {
            CommandJob::Finished(output) => output,
            CommandJob::Running(_) => {
                return Err(ProviderError::InvalidResponse(
                    "results collected before the provider finished".to_string(),
                ))
            }
        };

        Self::check_exit(&output)?;

        let mut result: BatchResult = serde_json::from_slice(&output.stdout)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        // Relative paths in the result are relative to the batch folder
        for list in [
            &mut result.succeeded,
            &mut result.pending,
            &mut result.failed,
            &mut result.same,
        ] {
            for file in list.iter_mut() {
                if file.original_file.is_relative() {
                    file.original_file = folder.join(&file.original_file);
                }
            }
        }

        Ok(result)
    }
}
