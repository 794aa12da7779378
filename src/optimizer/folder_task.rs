//! # Folder Task Orchestrator
//!
//! Orchestratore del run periodico: recovery del run precedente, chiamata
//! al provider, persistenza dello stato e repair dell'asset store.
//!
//! ## Flusso di esecuzione:
//! 1. **Start**: verifica credenziale, risolve la root folder (path assoluto)
//! 2. **Check recovery**: se il RunState contiene file, li ripara e lo svuota
//! 3. **Call provider**: batch limitato (`max_files_per_call`); un errore qui
//!    è fatale e interrompe il run senza toccare lo stato
//! 4. **Merge results**: `succeeded` + `pending` = file manipolati
//! 5. **Persist state**: salva i file manipolati (anche lista vuota), prima
//!    del repair, così un crash durante il repair resta recuperabile
//! 6. **Repair store**: dopo un cooldown, ripara i file manipolati
//! 7. **Done**: logga la durata
//!
//! ## Error handling:
//! - Errori di repair per singoli file: loggati, il loop continua
//! - RunState illeggibile: loggato, niente da recuperare
//! - Errore del provider: `OptimizeError::ProviderAborted`, fatale
//!
//! `api_status()` interroga lo stato dell'account con lo stesso controllo
//! sulla credenziale del run.
//!
//! Il run è sequenziale e non deve sovrapporsi a sé stesso.

use crate::{
    config::Config,
    error::{OptimizeError, ProviderError},
    optimizer::{
        path_resolver::PathResolver,
        repairer::{AssetRepair, RepairOutcome},
    },
    progress::{ProgressManager, RepairStats, RunSummary},
    provider::{ApiStatus, BatchRequest, BatchResult, OptimizationProvider},
    state::{FileDescriptor, RunState, RunStateStore, SiteConfigStore},
};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, warn, Instrument};

/// Run controller of the folder optimization task
pub struct FolderTask<P: OptimizationProvider> {
    config: Config,
    provider: P,
    state: Arc<dyn RunStateStore>,
    repairer: Arc<dyn AssetRepair>,
    site_config: Option<Arc<SiteConfigStore>>,
    show_progress: bool,
}

impl<P: OptimizationProvider> FolderTask<P> {
    pub fn new(
        config: Config,
        provider: P,
        state: Arc<dyn RunStateStore>,
        repairer: Arc<dyn AssetRepair>,
    ) -> Self {
        Self {
            config,
            provider,
            state,
            repairer,
            site_config: None,
            show_progress: false,
        }
    }

    /// Record holding the operational enable flag
    pub fn with_site_config(mut self, site_config: Arc<SiteConfigStore>) -> Self {
        self.site_config = Some(site_config);
        self
    }

    /// Draw a progress bar during repair loops
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Whether the task may run. Without a site config record it always can.
    pub async fn is_enabled(&self) -> anyhow::Result<bool> {
        match &self.site_config {
            Some(site_config) => Ok(!site_config.is_task_disabled().await?),
            None => Ok(true),
        }
    }

    /// Account status of the configured key. A missing credential is an
    /// error; provider failures come back as a status carrying `Error`.
    pub async fn api_status(&self) -> Result<ApiStatus, OptimizeError> {
        self.config.api_key()?;

        match self.provider.api_status().await {
            Ok(status) => Ok(status),
            Err(e) => {
                warn!("Api status unavailable: {}", e);
                Ok(ApiStatus::from_error(e.to_string()))
            }
        }
    }

    /// Execute one run. Every log line is tagged with the run's start time.
    pub async fn run(&self) -> Result<RunSummary, OptimizeError> {
        let run_id = Utc::now().format("%Y%m%dT%H%M%S").to_string();
        let span = info_span!("shortpixel.foldertask", run = %run_id);
        self.run_phases().instrument(span).await
    }

    async fn run_phases(&self) -> Result<RunSummary, OptimizeError> {
        let start_time = Instant::now();

        self.config.api_key()?;

        let root = self.resolve_root().await?;
        let mut summary = RunSummary::default();
        info!("Processing images in {}", root.display());

        if self.config.use_simple_image_recovering {
            summary.recovery = self.recover_previous_run(&root).await;
        }

        info!("Run Shortpixel call...");
        let result = match self.call_provider(&root).await {
            Ok(result) => result,
            Err(e) => {
                error!("ERROR: {}", e);
                return Err(OptimizeError::ProviderAborted(e));
            }
        };
        Self::log_result(&result, &mut summary);

        let manipulated_files = result.manipulated_files();

        // Durability point for the next run's recovery
        let blob = RunState::new(manipulated_files.clone()).encode()?;
        self.state
            .set(blob)
            .await
            .map_err(|e| OptimizeError::State(e.to_string()))?;

        if !manipulated_files.is_empty() {
            tokio::time::sleep(Duration::from_secs(self.config.repair_cooldown_seconds)).await;
            if self.config.use_simple_image_recovering {
                summary.repair = Some(self.repair_files(&manipulated_files, &root).await);
            }
        }

        summary.duration_seconds = start_time.elapsed().as_secs_f64();
        info!("Done after {} seconds.", start_time.elapsed().as_secs());
        Ok(summary)
    }

    /// Absolute root, so provider paths can be made relative to it
    async fn resolve_root(&self) -> Result<PathBuf, OptimizeError> {
        let root = tokio::fs::canonicalize(self.config.root_folder()).await?;
        if !root.is_dir() {
            return Err(OptimizeError::Validation(format!(
                "Root folder is not a directory: {}",
                root.display()
            )));
        }
        Ok(root)
    }

    /// Repair whatever the previous run left behind, then clear it
    async fn recover_previous_run(&self, root: &Path) -> Option<RepairStats> {
        info!("Check: needs recover images from previous run...");

        let blob = match self.state.get().await {
            Ok(blob) => blob,
            Err(e) => {
                warn!("Could not read run state, skipping recovery: {}", e);
                None
            }
        };
        let previous = RunState::decode(blob.as_deref());

        if previous.is_empty() {
            info!("Nothing to recover.");
            return None;
        }

        info!("Recovering {} images from previous run.", previous.files.len());
        let stats = self.repair_files(&previous.files, root).await;

        if let Err(e) = self.state.clear().await {
            warn!("Could not clear run state after recovery: {}", e);
        }

        Some(stats)
    }

    async fn call_provider(&self, root: &Path) -> Result<BatchResult, ProviderError> {
        let wait = Duration::from_secs(self.config.wait_seconds);
        let request = BatchRequest {
            folder: root.to_path_buf(),
            max_files: self.config.max_files_per_call,
            exclude_folders: self.config.exclude_folders.clone(),
            body_size_limit: self.config.client_max_body_size,
            wait,
        };

        let job = self.provider.submit(&request).await?;
        let job = self.provider.wait(job, wait).await?;
        self.provider.collect_results(job, root).await
    }

    fn log_result(result: &BatchResult, summary: &mut RunSummary) {
        info!("Status code: {}", result.status.code);
        info!("Status message: {}", result.status.message);
        info!("Succeeded: {}", result.succeeded.len());
        info!("Pending: {}", result.pending.len());
        info!("Failed: {}", result.failed.len());
        info!("Same: {}", result.same.len());

        summary.status_code = result.status.code;
        summary.status_message = result.status.message.clone();
        summary.succeeded = result.succeeded.len();
        summary.pending = result.pending.len();
        summary.failed = result.failed.len();
        summary.same = result.same.len();
    }

    /// Best-effort repair loop; failures are logged and skipped
    async fn repair_files(&self, files: &[FileDescriptor], root: &Path) -> RepairStats {
        let progress = ProgressManager::new(files.len() as u64, self.show_progress);
        let mut stats = RepairStats::new();

        for file in files {
            let processed = PathResolver::provider_relative(&file.original_file, root);
            info!("Check needs fix assets store: {}", processed);

            match self.repairer.repair(&processed).await {
                Ok(RepairOutcome::Recovered) => {
                    info!("Fixed assets store: {}", processed);
                    stats.add(RepairOutcome::Recovered);
                }
                Ok(outcome) => {
                    info!("Skipped: {}, {}", processed, outcome);
                    stats.add(outcome);
                }
                Err(e) => {
                    warn!("Repair failed for {}: {}", processed, e);
                    stats.add_error();
                }
            }
            progress.update(&processed);
        }

        progress.finish(&stats.format_summary());
        info!("{}", stats.format_summary());
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStateStore;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const KEY_ENV: &str = "FOLDER_TASK_TEST_SP_APIKEY";

    /// Provider returning a canned result, or failing
    struct FakeProvider {
        result: std::result::Result<BatchResult, String>,
        status: std::result::Result<ApiStatus, String>,
        calls: Mutex<Vec<BatchRequest>>,
    }

    impl FakeProvider {
        fn returning(result: BatchResult) -> Self {
            Self {
                result: Ok(result),
                status: Err("status not configured".to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                result: Err(message.to_string()),
                status: Err(message.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl OptimizationProvider for FakeProvider {
        type Job = ();

        async fn api_status(&self) -> Result<ApiStatus, ProviderError> {
            self.status.clone().map_err(|message| ProviderError::Failed { code: -401, message })
        }

        async fn submit(&self, request: &BatchRequest) -> Result<(), ProviderError> {
            self.calls.lock().unwrap().push(request.clone());
            Ok(())
        }

        async fn wait(&self, _job: (), _timeout: Duration) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn collect_results(&self, _job: (), _folder: &Path) -> Result<BatchResult, ProviderError> {
            match &self.result {
                Ok(result) => Ok(result.clone()),
                Err(message) => Err(ProviderError::Failed {
                    code: -403,
                    message: message.clone(),
                }),
            }
        }
    }

    /// Repairer recording every call; paths listed in `failing` error out.
    /// With `state` set, it also records the persisted blob seen while repairing.
    #[derive(Default)]
    struct RecordingRepairer {
        calls: Mutex<Vec<String>>,
        failing: Vec<String>,
        state: Option<Arc<MemoryStateStore>>,
        seen_state: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl AssetRepair for RecordingRepairer {
        async fn repair(&self, relative_filename: &str) -> Result<RepairOutcome> {
            self.calls.lock().unwrap().push(relative_filename.to_string());
            if let Some(state) = &self.state {
                let blob = state.get().await?;
                self.seen_state.lock().unwrap().push(blob);
            }
            if self.failing.iter().any(|f| f == relative_filename) {
                return Err(anyhow::anyhow!("store unavailable"));
            }
            Ok(RepairOutcome::Recovered)
        }
    }

    /// Run state store whose reads always fail
    #[derive(Default)]
    struct UnreadableStateStore {
        inner: MemoryStateStore,
    }

    #[async_trait]
    impl RunStateStore for UnreadableStateStore {
        async fn get(&self) -> Result<Option<String>> {
            Err(anyhow::anyhow!("record is corrupt"))
        }

        async fn set(&self, blob: String) -> Result<()> {
            self.inner.set(blob).await
        }

        async fn clear(&self) -> Result<()> {
            self.inner.clear().await
        }
    }

    /// Asset root for one test, with its resolved absolute path
    struct Root {
        _dir: TempDir,
        path: PathBuf,
    }

    impl Root {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let path = dir.path().canonicalize().unwrap();
            Self { _dir: dir, path }
        }

        fn file(&self, relative: &str) -> PathBuf {
            self.path.join(relative)
        }

        fn config(&self) -> Config {
            std::env::set_var(KEY_ENV, "test-key");
            Config {
                root_folder: Some(self.path.clone()),
                repair_cooldown_seconds: 0,
                api_key_env: KEY_ENV.to_string(),
                ..Default::default()
            }
        }
    }

    fn task(
        config: Config,
        provider: FakeProvider,
        state: &Arc<MemoryStateStore>,
        repairer: &Arc<RecordingRepairer>,
    ) -> FolderTask<FakeProvider> {
        FolderTask::new(config, provider, state.clone(), repairer.clone())
    }

    fn succeeded(paths: &[PathBuf]) -> BatchResult {
        BatchResult {
            succeeded: paths.iter().map(|p| FileDescriptor::new(p.clone())).collect(),
            ..Default::default()
        }
    }

    /// Shared buffer receiving formatted log output
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[tokio::test]
    async fn test_fresh_run_persists_and_repairs() {
        let root = Root::new();
        let state = Arc::new(MemoryStateStore::default());
        let repairer = Arc::new(RecordingRepairer::default());
        let provider = FakeProvider::returning(succeeded(&[root.file("a.jpg")]));

        let summary = task(root.config(), provider, &state, &repairer).run().await.unwrap();

        let persisted = RunState::decode(state.get().await.unwrap().as_deref());
        assert_eq!(persisted.files, vec![FileDescriptor::new(root.file("a.jpg"))]);
        assert_eq!(*repairer.calls.lock().unwrap(), vec!["a.jpg".to_string()]);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.recovery, None);
        assert_eq!(summary.repair.as_ref().map(|s| s.recovered), Some(1));
    }

    #[tokio::test]
    async fn test_state_is_persisted_before_repair() {
        let root = Root::new();
        let state = Arc::new(MemoryStateStore::default());
        let repairer = Arc::new(RecordingRepairer {
            state: Some(state.clone()),
            ..Default::default()
        });
        let provider = FakeProvider::returning(succeeded(&[root.file("a.jpg"), root.file("sub/b.png")]));

        task(root.config(), provider, &state, &repairer).run().await.unwrap();

        let seen = repairer.seen_state.lock().unwrap();
        assert_eq!(seen.len(), 2);
        for blob in seen.iter() {
            let during_repair = RunState::decode(blob.as_deref());
            assert_eq!(
                during_repair.files,
                vec![FileDescriptor::new(root.file("a.jpg")), FileDescriptor::new(root.file("sub/b.png"))]
            );
        }
    }

    #[tokio::test]
    async fn test_root_is_resolved_before_provider_call() {
        let root = Root::new();
        std::fs::create_dir_all(root.file("Uploads")).unwrap();
        let state = Arc::new(MemoryStateStore::default());
        let repairer = Arc::new(RecordingRepairer::default());
        let mut cfg = root.config();
        cfg.root_folder = Some(root.path.join("Uploads/.."));
        let task = task(cfg, FakeProvider::returning(succeeded(&[root.file("Uploads/a.jpg")])), &state, &repairer);

        task.run().await.unwrap();

        assert_eq!(task.provider.calls.lock().unwrap()[0].folder, root.path);
        assert_eq!(*repairer.calls.lock().unwrap(), vec!["Uploads/a.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_root_fails_before_provider() {
        let root = Root::new();
        let state = Arc::new(MemoryStateStore::default());
        let repairer = Arc::new(RecordingRepairer::default());
        let mut cfg = root.config();
        cfg.root_folder = Some(root.file("does-not-exist"));
        let task = task(cfg, FakeProvider::returning(BatchResult::default()), &state, &repairer);

        let err = task.run().await.unwrap_err();

        assert!(matches!(err, OptimizeError::Io(_)));
        assert!(!err.is_fatal());
        assert!(task.provider.calls.lock().unwrap().is_empty());
        assert_eq!(state.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_provider_receives_bounded_batch() {
        let root = Root::new();
        let state = Arc::new(MemoryStateStore::default());
        let repairer = Arc::new(RecordingRepairer::default());
        let mut cfg = root.config();
        cfg.max_files_per_call = 3;
        cfg.exclude_folders = vec!["_resampled".to_string()];
        let task = task(cfg, FakeProvider::returning(BatchResult::default()), &state, &repairer);

        task.run().await.unwrap();

        let calls = task.provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].folder, root.path);
        assert_eq!(calls[0].max_files, 3);
        assert_eq!(calls[0].exclude_folders, vec!["_resampled".to_string()]);
        assert_eq!(calls[0].body_size_limit, 48);
        assert_eq!(calls[0].wait, Duration::from_secs(500));
    }

    #[tokio::test]
    async fn test_pending_files_are_persisted_and_repaired() {
        let root = Root::new();
        let state = Arc::new(MemoryStateStore::default());
        let repairer = Arc::new(RecordingRepairer::default());
        let result = BatchResult {
            succeeded: vec![FileDescriptor::new(root.file("a.jpg"))],
            pending: vec![FileDescriptor::new(root.file("sub/b.png"))],
            failed: vec![FileDescriptor::new(root.file("c.gif"))],
            ..Default::default()
        };

        task(root.config(), FakeProvider::returning(result), &state, &repairer)
            .run()
            .await
            .unwrap();

        let persisted = RunState::decode(state.get().await.unwrap().as_deref());
        assert_eq!(persisted.files.len(), 2);
        assert_eq!(
            *repairer.calls.lock().unwrap(),
            vec!["a.jpg".to_string(), "sub/b.png".to_string()]
        );
    }

    #[tokio::test]
    async fn test_recovery_consumes_state_once() {
        let root = Root::new();
        let previous = RunState::new(vec![
            FileDescriptor::new(root.file("old1.jpg")),
            FileDescriptor::new(root.file("old2.jpg")),
        ]);
        let state = Arc::new(MemoryStateStore::new(Some(previous.encode().unwrap())));
        let repairer = Arc::new(RecordingRepairer {
            failing: vec!["old1.jpg".to_string()],
            ..Default::default()
        });

        let summary = task(root.config(), FakeProvider::returning(BatchResult::default()), &state, &repairer)
            .run()
            .await
            .unwrap();

        let recovery = summary.recovery.unwrap();
        assert_eq!(recovery.errors, 1);
        assert_eq!(recovery.recovered, 1);
        assert_eq!(
            *repairer.calls.lock().unwrap(),
            vec!["old1.jpg".to_string(), "old2.jpg".to_string()]
        );
        // Empty provider result clears the state
        assert!(RunState::decode(state.get().await.unwrap().as_deref()).is_empty());
        assert_eq!(summary.repair, None);

        // A second run finds nothing to recover
        let second = task(root.config(), FakeProvider::returning(BatchResult::default()), &state, &repairer)
            .run()
            .await
            .unwrap();
        assert_eq!(second.recovery, None);
        assert_eq!(repairer.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unreadable_state_skips_recovery() {
        let root = Root::new();
        let state = Arc::new(UnreadableStateStore::default());
        let repairer = Arc::new(RecordingRepairer::default());
        let provider = FakeProvider::returning(succeeded(&[root.file("a.jpg")]));
        let task = FolderTask::new(root.config(), provider, state.clone(), repairer.clone());

        let summary = task.run().await.unwrap();

        assert_eq!(summary.recovery, None);
        assert_eq!(task.provider.calls.lock().unwrap().len(), 1);
        assert!(state.inner.get().await.unwrap().is_some());
        assert_eq!(*repairer.calls.lock().unwrap(), vec!["a.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_provider_failure_is_fatal_and_leaves_state() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let root = Root::new();
        let blob = r#"[{"OriginalFile":"/srv/assets/keep.jpg"}]"#.to_string();
        let state = Arc::new(MemoryStateStore::new(Some(blob.clone())));
        let repairer = Arc::new(RecordingRepairer::default());
        let mut cfg = root.config();
        cfg.use_simple_image_recovering = false;

        let err = task(cfg, FakeProvider::failing("Account quota exceeded"), &state, &repairer)
            .run()
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert!(matches!(err, OptimizeError::ProviderAborted(_)));
        assert!(logs.contents().contains("Account quota exceeded"));
        assert!(logs.contents().contains("shortpixel.foldertask"));
        assert_eq!(state.get().await.unwrap(), Some(blob));
        assert!(repairer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_credential_has_no_side_effects() {
        let root = Root::new();
        let blob = r#"[{"OriginalFile":"/srv/assets/keep.jpg"}]"#.to_string();
        let state = Arc::new(MemoryStateStore::new(Some(blob.clone())));
        let repairer = Arc::new(RecordingRepairer::default());
        let cfg = Config {
            api_key_env: "FOLDER_TASK_TEST_NEVER_SET".to_string(),
            ..root.config()
        };
        let task = task(cfg, FakeProvider::returning(succeeded(&[root.file("a.jpg")])), &state, &repairer);

        let err = task.run().await.unwrap_err();

        assert!(matches!(err, OptimizeError::MissingCredential(_)));
        assert!(task.provider.calls.lock().unwrap().is_empty());
        assert!(repairer.calls.lock().unwrap().is_empty());
        assert_eq!(state.get().await.unwrap(), Some(blob));
    }

    #[tokio::test]
    async fn test_enable_flag() {
        let root = Root::new();
        let state_dir = TempDir::new().unwrap();
        let state = Arc::new(MemoryStateStore::default());
        let repairer = Arc::new(RecordingRepairer::default());
        let site_config = Arc::new(SiteConfigStore::new(state_dir.path(), &root.path));

        let bare = task(root.config(), FakeProvider::returning(BatchResult::default()), &state, &repairer);
        assert!(bare.is_enabled().await.unwrap());

        let flagged = bare.with_site_config(site_config.clone());
        assert!(flagged.is_enabled().await.unwrap());
        site_config.set_task_disabled(true).await.unwrap();
        assert!(!flagged.is_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn test_recovering_disabled_still_persists() {
        let root = Root::new();
        let state = Arc::new(MemoryStateStore::default());
        let repairer = Arc::new(RecordingRepairer::default());
        let mut cfg = root.config();
        cfg.use_simple_image_recovering = false;

        let summary = task(cfg, FakeProvider::returning(succeeded(&[root.file("a.jpg")])), &state, &repairer)
            .run()
            .await
            .unwrap();

        assert_eq!(RunState::decode(state.get().await.unwrap().as_deref()).files.len(), 1);
        assert!(repairer.calls.lock().unwrap().is_empty());
        assert_eq!(summary.repair, None);
    }

    #[tokio::test]
    async fn test_recovering_disabled_overwrites_stale_state() {
        let root = Root::new();
        let stale = RunState::new(vec![FileDescriptor::new(root.file("old.jpg"))]);
        let state = Arc::new(MemoryStateStore::new(Some(stale.encode().unwrap())));
        let repairer = Arc::new(RecordingRepairer::default());
        let mut cfg = root.config();
        cfg.use_simple_image_recovering = false;

        let summary = task(cfg, FakeProvider::returning(BatchResult::default()), &state, &repairer)
            .run()
            .await
            .unwrap();

        assert_eq!(state.get().await.unwrap().as_deref(), Some("[]"));
        assert!(repairer.calls.lock().unwrap().is_empty());
        assert_eq!(summary.recovery, None);
    }

    #[tokio::test]
    async fn test_api_status() {
        let root = Root::new();
        let state = Arc::new(MemoryStateStore::default());
        let repairer = Arc::new(RecordingRepairer::default());

        let mut provider = FakeProvider::returning(BatchResult::default());
        provider.status = Ok(ApiStatus::parse(br#"{"APICallsQuota":"5000"}"#).unwrap());
        let status = task(root.config(), provider, &state, &repairer).api_status().await.unwrap();
        assert_eq!(status.lines(), vec!["APICallsQuota: 5000"]);

        let failing = task(root.config(), FakeProvider::failing("Wrong API Key"), &state, &repairer);
        let status = failing.api_status().await.unwrap();
        assert!(status.error().unwrap().contains("Wrong API Key"));

        let cfg = Config {
            api_key_env: "FOLDER_TASK_TEST_NEVER_SET".to_string(),
            ..root.config()
        };
        let missing = task(cfg, FakeProvider::returning(BatchResult::default()), &state, &repairer);
        assert!(matches!(missing.api_status().await, Err(OptimizeError::MissingCredential(_))));
    }
}
