//! Sync manager
//!
//! The [`SyncManager`] is what a host game loop talks to. It wires the
//! manifest builder, throttle, plan service, transfer executor and
//! completion acknowledgement into one attempt, and reports the result as a
//! [`SyncOutcome`] value. Sync entry points never return errors.
//!
//! ## Attempt Flow
//!
//! 1. **Gates**: credential present, no other attempt running, throttle open
//! 2. **Plan**: build the local manifest, request a plan (resets the throttle)
//! 3. **Execute**: uploads and downloads before the capability deadline
//! 4. **Acknowledge**: report success or failure so the remote record is
//!    committed or left alone

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use savesync_core::config::Config;
use savesync_core::domain::{Filename, GameId, Manifest};
use savesync_core::error::SaveSyncError;
use savesync_core::ports::{
    CompletionRequest, ICredentialProvider, ISyncService, ITransferClient, PlanRequest,
    PlanResponse,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backup::BackupManager;
use crate::executor::{ExecutionReport, TransferExecutor};
use crate::manifest::ManifestBuilder;
use crate::retry::{with_retry, RetryPolicy};
use crate::throttle::{SyncMode, ThrottleController};

// ============================================================================
// SyncOutcome
// ============================================================================

/// Result of one sync entry point call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Every planned action completed and the remote record was committed
    Synced { report: ExecutionReport },
    /// Local and remote state already agree
    NothingToDo,
    /// A start-of-session sync inside the throttle window
    Throttled { next_allowed: Option<DateTime<Utc>> },
    /// No credential is held, or it could not be refreshed
    NotAuthenticated,
    /// Another sync is in flight in this process
    AlreadyRunning,
    /// The attempt ran but did not complete
    Failed {
        reason: String,
        report: Option<ExecutionReport>,
    },
    /// A quit-time sync exceeded the quit timeout
    TimedOut,
}

impl SyncOutcome {
    /// Returns true if local and remote state are known to agree afterwards
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Synced { .. } | SyncOutcome::NothingToDo)
    }

    fn failed(reason: impl Into<String>) -> Self {
        SyncOutcome::Failed {
            reason: reason.into(),
            report: None,
        }
    }
}

/// Snapshot of the manager's bookkeeping
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub game_id: GameId,
    pub last_attempt: Option<DateTime<Utc>>,
    pub next_allowed: Option<DateTime<Utc>>,
    pub running: bool,
    pub pending_deletes: Vec<Filename>,
}

// ============================================================================
// RunningGuard
// ============================================================================

/// Clears the in-flight flag when an attempt ends, including on cancellation
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ============================================================================
// SyncManager
// ============================================================================

/// Client-side sync orchestration for one game and save directory
pub struct SyncManager {
    game_id: GameId,
    credentials: Arc<dyn ICredentialProvider + Send + Sync>,
    service: Arc<dyn ISyncService + Send + Sync>,
    manifests: ManifestBuilder,
    executor: TransferExecutor,
    throttle: Mutex<ThrottleController>,
    pending_deletes: Mutex<BTreeSet<Filename>>,
    running: AtomicBool,
    retry: RetryPolicy,
    quit_timeout: Duration,
    capability_ttl: Duration,
}

impl SyncManager {
    /// Creates a manager from a validated configuration
    ///
    /// Loads the throttle state from `config.sync.state_file`.
    ///
    /// # Errors
    ///
    /// Fails with `Configuration` listing every invalid field.
    pub fn new(
        config: &Config,
        credentials: Arc<dyn ICredentialProvider + Send + Sync>,
        service: Arc<dyn ISyncService + Send + Sync>,
        transfer: Arc<dyn ITransferClient + Send + Sync>,
    ) -> Result<Self, SaveSyncError> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(SaveSyncError::Configuration(errors));
        }

        let retry = RetryPolicy::new(config.sync.max_retries);
        let manifests = ManifestBuilder::new(&config.client.save_dir);
        let backups = BackupManager::new(config.backup_dir(), config.backup.max_per_file);
        let executor = TransferExecutor::new(transfer, manifests.clone(), backups, retry);
        let throttle = ThrottleController::load(&config.sync.state_file, config.sync.interval());

        Ok(Self {
            game_id: config.game_id()?,
            credentials,
            service,
            manifests,
            executor,
            throttle: Mutex::new(throttle),
            pending_deletes: Mutex::new(BTreeSet::new()),
            running: AtomicBool::new(false),
            retry,
            quit_timeout: config.sync.quit_timeout(),
            capability_ttl: config.sync.capability_ttl(),
        })
    }

    /// Start-of-session sync; skipped inside the throttle window
    pub async fn sync_on_start(&self) -> SyncOutcome {
        self.run(SyncMode::Start).await
    }

    /// Quit-time sync; ignores the throttle, bounded by the quit timeout
    ///
    /// An action cut off by the timeout leaves its local file as it was.
    pub async fn sync_on_quit(&self) -> SyncOutcome {
        match tokio::time::timeout(self.quit_timeout, self.run(SyncMode::Quit)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    game_id = %self.game_id,
                    timeout_secs = self.quit_timeout.as_secs(),
                    "Quit-time sync timed out"
                );
                SyncOutcome::TimedOut
            }
        }
    }

    /// User-requested sync; ignores the throttle
    pub async fn force_sync(&self) -> SyncOutcome {
        self.run(SyncMode::Force).await
    }

    /// Marks a file as deleted by the user
    ///
    /// The marker is sent with the next plan request and cleared once a
    /// sync carrying it completes.
    pub async fn mark_deleted(&self, filename: Filename) {
        info!(filename = %filename, "File marked deleted");
        self.pending_deletes.lock().await.insert(filename);
    }

    /// Current bookkeeping
    pub async fn status(&self) -> SyncStatus {
        let throttle = self.throttle.lock().await;
        SyncStatus {
            game_id: self.game_id.clone(),
            last_attempt: throttle.last_attempt(),
            next_allowed: throttle.next_allowed(),
            running: self.running.load(Ordering::Acquire),
            pending_deletes: self.pending_deletes.lock().await.iter().cloned().collect(),
        }
    }

    /// Builds the local manifest without syncing
    pub async fn local_manifest(&self) -> Result<Manifest, SaveSyncError> {
        self.manifests.build().await
    }

    #[tracing::instrument(skip(self), fields(game_id = %self.game_id, mode = mode.as_str()))]
    async fn run(&self, mode: SyncMode) -> SyncOutcome {
        let outcome = self.attempt(mode).await;
        match &outcome {
            SyncOutcome::Synced { report } => info!(
                uploaded = report.uploaded.len(),
                downloaded = report.downloaded.len(),
                "Sync completed"
            ),
            SyncOutcome::Failed { reason, .. } => warn!(reason = %reason, "Sync failed"),
            other => debug!(outcome = ?other, "Sync skipped or idle"),
        }
        outcome
    }

    async fn attempt(&self, mode: SyncMode) -> SyncOutcome {
        // Step 1: Gates
        if !self.credentials.is_authenticated().await {
            return SyncOutcome::NotAuthenticated;
        }
        let Some(_guard) = RunningGuard::acquire(&self.running) else {
            return SyncOutcome::AlreadyRunning;
        };
        let mut throttle = self.throttle.lock().await;
        if !throttle.should_run(mode, Utc::now()) {
            return SyncOutcome::Throttled {
                next_allowed: throttle.next_allowed(),
            };
        }

        // Step 2: Local manifest and credential
        let manifest = match self.manifests.build().await {
            Ok(manifest) => manifest,
            Err(e) => return SyncOutcome::failed(format!("cannot build manifest: {e}")),
        };
        let token = match self.credentials.bearer_token().await {
            Ok(token) => token,
            Err(e) if e.is_authentication() => return SyncOutcome::NotAuthenticated,
            Err(e) => return SyncOutcome::failed(e.to_string()),
        };

        // Step 3: Request a plan; from here on the attempt counts
        if let Err(e) = throttle.record_attempt(Utc::now()).await {
            warn!(error = %e, "Cannot persist throttle state");
        }
        drop(throttle);

        let deletes: Vec<Filename> = self.pending_deletes.lock().await.iter().cloned().collect();
        let request = PlanRequest {
            game_id: self.game_id.clone(),
            manifest,
            deletes: deletes.clone(),
        };
        let plan = match with_retry(&self.retry, "request_plan", || {
            self.service.request_plan(&token, &request)
        })
        .await
        {
            Ok(plan) => plan,
            Err(e) if e.is_authentication() => return SyncOutcome::NotAuthenticated,
            Err(e) => return SyncOutcome::failed(format!("plan request failed: {e}")),
        };

        if !plan.has_actions() {
            self.clear_deletes(&deletes).await;
            return SyncOutcome::NothingToDo;
        }

        // Step 4: Execute before the capabilities lapse
        let deadline = tokio::time::Instant::now() + self.action_window(&plan);
        let report = self.executor.execute(&plan, deadline).await;

        // Step 5: Acknowledge
        let ack = CompletionRequest {
            game_id: self.game_id.clone(),
            plan_id: plan.plan_id,
            success: report.is_success(),
            error: report.failure_summary(),
        };
        let acknowledged = with_retry(&self.retry, "complete", || {
            self.service.complete(&token, &ack)
        })
        .await;

        match acknowledged {
            Ok(response) if response.acknowledged => {}
            Ok(_) => {
                return SyncOutcome::Failed {
                    reason: "completion was not acknowledged".into(),
                    report: Some(report),
                }
            }
            Err(e) => {
                return SyncOutcome::Failed {
                    reason: format!("completion acknowledgement failed: {e}"),
                    report: Some(report),
                }
            }
        }

        if let Some(reason) = report.failure_summary() {
            return SyncOutcome::Failed {
                reason,
                report: Some(report),
            };
        }

        self.clear_deletes(&deletes).await;
        SyncOutcome::Synced { report }
    }

    /// Time allowed for executing `plan`, measured from its receipt
    fn action_window(&self, plan: &PlanResponse) -> Duration {
        Duration::from_secs(plan.expires_in).min(self.capability_ttl)
    }

    async fn clear_deletes(&self, sent: &[Filename]) {
        if sent.is_empty() {
            return;
        }
        let mut pending = self.pending_deletes.lock().await;
        for filename in sent {
            pending.remove(filename);
        }
    }
}
