//! Client-side run orchestration.
//!
//! One `PipelineController` per session. It owns the step board, the
//! research resume cache, the finished report and the session rate limiter;
//! nothing else mutates them. Runs are cancelled cooperatively: `stop()`
//! cancels the run's token and every await in the run is a checkpoint that
//! returns early once the token fires. Late results from a cancelled or
//! superseded run are discarded.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use super::backend::{BackendError, StageBackend};
use super::steps::{AnalysisStep, StepBoard, StepId, StepStatus};
use crate::models::{
    AuditReport, FullReport, ProfessorAnalysisResult, ResearchResult, ValidationResult,
};
use crate::rate_limit::{rate_limit_message, RateLimitConfig, RateLimiter};
use crate::stages::handlers::{AuditPayload, SynthesisPayload};
use crate::stages::sanitize::is_allowed_input;

/// Pause between research and synthesis.
pub const REVIEW_PAUSE: Duration = Duration::from_millis(800);

pub const INVALID_CHARACTERS_MESSAGE: &str = "특수문자나 허용되지 않은 문자가 포함되어 있습니다.";
pub const RUN_FAILED_MESSAGE: &str = "분석 중 오류가 발생했습니다. 잠시 후 다시 시도해주세요.";

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub review_pause: Duration,
    pub rate_limit: RateLimitConfig,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            review_pause: REVIEW_PAUSE,
            rate_limit: RateLimitConfig::CLIENT,
        }
    }
}

/// Snapshot of the three research results, kept for resume.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchCache {
    pub curriculum: ResearchResult,
    pub professors: ProfessorAnalysisResult,
    pub trends: ResearchResult,
}

/// A typo suggestion waiting for the user.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingValidation {
    pub university: String,
    pub department: String,
    pub result: ValidationResult,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(FullReport),
    RateLimited { retry_after: Duration, message: String },
    InvalidInput { message: String },
    /// The institution does not exist; the message explains why.
    Invalid(ValidationResult),
    /// A likely typo; call `confirm_correction` or `proceed_anyway`.
    NeedsConfirmation(ValidationResult),
    /// Stopped by the user. Completed research stays cached.
    Paused,
    Failed { message: String },
    /// Nothing to confirm or resume.
    NotStarted,
}

#[derive(Debug)]
enum RunError {
    Cancelled,
    Backend(BackendError),
}

impl From<BackendError> for RunError {
    fn from(e: BackendError) -> Self {
        RunError::Backend(e)
    }
}

struct Session {
    steps: StepBoard,
    cache: Option<ResearchCache>,
    report: Option<FullReport>,
    pending: Option<PendingValidation>,
    /// Names of the most recent run, used by `resume`.
    names: Option<(String, String)>,
    cancel: Option<CancellationToken>,
    run_seq: u64,
    limiter: RateLimiter,
}

pub struct PipelineController {
    backend: Arc<dyn StageBackend>,
    review_pause: Duration,
    session: Mutex<Session>,
}

impl PipelineController {
    pub fn new(backend: Arc<dyn StageBackend>, options: ControllerOptions) -> Self {
        Self {
            backend,
            review_pause: options.review_pause,
            session: Mutex::new(Session {
                steps: StepBoard::new(),
                cache: None,
                report: None,
                pending: None,
                names: None,
                cancel: None,
                run_seq: 0,
                limiter: RateLimiter::new(options.rate_limit),
            }),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Getters ─────────────────────────────────────────────────────────────

    pub fn steps(&self) -> Vec<AnalysisStep> {
        self.session().steps.steps().to_vec()
    }

    pub fn step_status(&self, id: StepId) -> StepStatus {
        self.session().steps.status(id)
    }

    pub fn report(&self) -> Option<FullReport> {
        self.session().report.clone()
    }

    pub fn cache(&self) -> Option<ResearchCache> {
        self.session().cache.clone()
    }

    pub fn pending_validation(&self) -> Option<PendingValidation> {
        self.session().pending.clone()
    }

    pub fn is_running(&self) -> bool {
        self.session().cancel.is_some()
    }

    // ── Entry points ────────────────────────────────────────────────────────

    /// A brand-new search: clears the resume cache, then checks the session
    /// quota, the character allow-list and the semantic validation before
    /// starting research.
    pub async fn run(&self, university: &str, department: &str) -> RunOutcome {
        {
            let mut session = self.session();
            session.cache = None;
            session.pending = None;
            if !session.limiter.check() {
                let wait = session.limiter.retry_after();
                warn!(retry_after_ms = wait.as_millis() as u64, "session rate limit reached");
                return RunOutcome::RateLimited {
                    retry_after: wait,
                    message: rate_limit_message(wait),
                };
            }
        }

        if !is_allowed_input(university) || !is_allowed_input(department) {
            return RunOutcome::InvalidInput {
                message: INVALID_CHARACTERS_MESSAGE.to_string(),
            };
        }

        let validation = match self.backend.validate(university, department).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "validation unavailable, proceeding without it");
                ValidationResult::fail_open()
            }
        };

        if !validation.is_valid {
            return RunOutcome::Invalid(validation);
        }
        if validation.needs_confirmation() {
            self.session().pending = Some(PendingValidation {
                university: university.to_string(),
                department: department.to_string(),
                result: validation.clone(),
            });
            return RunOutcome::NeedsConfirmation(validation);
        }

        self.start_analysis(university, department, false).await
    }

    /// Accepts the suggested correction. Names without a suggestion keep the
    /// user's original spelling.
    pub async fn confirm_correction(&self) -> RunOutcome {
        let Some(pending) = self.session().pending.take() else {
            return RunOutcome::NotStarted;
        };
        let university = pending.result.corrected_university.unwrap_or(pending.university);
        let department = pending.result.corrected_department.unwrap_or(pending.department);
        self.start_analysis(&university, &department, false).await
    }

    /// Ignores the suggested correction and runs with the user's strings.
    pub async fn proceed_anyway(&self) -> RunOutcome {
        let Some(pending) = self.session().pending.take() else {
            return RunOutcome::NotStarted;
        };
        self.start_analysis(&pending.university, &pending.department, false)
            .await
    }

    /// Re-runs the most recent search, reusing cached research when present.
    pub async fn resume(&self) -> RunOutcome {
        let Some((university, department)) = self.session().names.clone() else {
            return RunOutcome::NotStarted;
        };
        self.start_analysis(&university, &department, true).await
    }

    /// Cancels the running run, if any. Idempotent.
    pub fn stop(&self) {
        let mut session = self.session();
        if let Some(token) = session.cancel.take() {
            token.cancel();
            info!("run stopped by user");
        }
        session.steps.pause_loading();
    }

    /// Back to the initial state. The session rate-limit window is kept.
    pub fn reset(&self) {
        let mut session = self.session();
        if let Some(token) = session.cancel.take() {
            token.cancel();
        }
        session.run_seq += 1;
        session.steps = StepBoard::new();
        session.cache = None;
        session.report = None;
        session.pending = None;
        session.names = None;
    }

    /// Optional quality audit of the cached research. Advisory: transport
    /// failures yield `AuditReport::fail_open()`.
    pub async fn audit_cached(&self) -> Option<AuditReport> {
        let (cache, (university, department)) = {
            let session = self.session();
            (session.cache.clone()?, session.names.clone()?)
        };

        let request = AuditPayload {
            uni: university,
            dept: department,
            curriculum: serde_json::to_value(&cache.curriculum).unwrap_or(Value::Null),
            professors: serde_json::to_value(&cache.professors).unwrap_or(Value::Null),
            trends: serde_json::to_value(&cache.trends).unwrap_or(Value::Null),
            config: None,
        };

        Some(match self.backend.audit(request).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "audit unavailable");
                AuditReport::fail_open()
            }
        })
    }

    /// Runs research (unless served from cache), the review pause and
    /// synthesis. `use_cache` without a snapshot behaves like a fresh run.
    pub async fn start_analysis(&self, university: &str, department: &str, use_cache: bool) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let (token, seq, cached) = {
            let mut session = self.session();
            if let Some(previous) = session.cancel.take() {
                previous.cancel();
            }
            session.run_seq += 1;
            let token = CancellationToken::new();
            session.cancel = Some(token.clone());
            session.report = None;
            session.names = Some((university.to_string(), department.to_string()));

            let cached = if use_cache { session.cache.clone() } else { None };
            session.steps = StepBoard::new();
            match cached {
                Some(_) => session.steps.set(StepId::Research, StepStatus::Completed),
                None => session.steps.set(StepId::Research, StepStatus::Loading),
            }
            (token, session.run_seq, cached)
        };

        info!(%run_id, university, department, from_cache = cached.is_some(), "run started");
        let result = self
            .execute(university, department, &token, seq, cached)
            .await;

        let mut session = self.session();
        let current = session.run_seq == seq;
        if current {
            session.cancel = None;
        }

        match result {
            Ok(report) => {
                info!(%run_id, "run completed");
                RunOutcome::Completed(report)
            }
            Err(RunError::Cancelled) => {
                info!(%run_id, "run paused");
                if current {
                    session.steps.pause_loading();
                }
                RunOutcome::Paused
            }
            Err(RunError::Backend(e)) => {
                warn!(%run_id, error = %e, "run failed");
                if current {
                    session.steps.set(StepId::Research, StepStatus::Error);
                    session.steps.set(StepId::Synthesis, StepStatus::Error);
                    if session.steps.status(StepId::Review) == StepStatus::Loading {
                        session.steps.set(StepId::Review, StepStatus::Error);
                    }
                }
                RunOutcome::Failed {
                    message: RUN_FAILED_MESSAGE.to_string(),
                }
            }
        }
    }

    async fn execute(
        &self,
        university: &str,
        department: &str,
        token: &CancellationToken,
        seq: u64,
        cached: Option<ResearchCache>,
    ) -> Result<FullReport, RunError> {
        let research = match cached {
            Some(research) => research,
            None => {
                let backend = &self.backend;
                let (curriculum, professors, trends) = checkpoint(token, async {
                    tokio::try_join!(
                        backend.curriculum(university, department),
                        backend.professors(university, department),
                        backend.trends(university, department),
                    )
                })
                .await??;

                let research = ResearchCache {
                    curriculum,
                    professors,
                    trends,
                };
                self.update(seq, token, |s| {
                    s.cache = Some(research.clone());
                    s.steps.set(StepId::Research, StepStatus::Completed);
                })?;
                research
            }
        };

        self.update(seq, token, |s| s.steps.set(StepId::Review, StepStatus::Loading))?;
        checkpoint(token, tokio::time::sleep(self.review_pause)).await?;
        self.update(seq, token, |s| {
            s.steps.set(StepId::Review, StepStatus::Completed);
            s.steps.set(StepId::Synthesis, StepStatus::Loading);
        })?;

        let request = SynthesisPayload {
            uni: university.to_string(),
            dept: department.to_string(),
            curriculum: research.curriculum.text.clone(),
            professors: research.professors.professors.clone(),
            trends: research.trends.text.clone(),
            sub_task: None,
            config: None,
        };
        let strategy = checkpoint(token, self.backend.synthesis(request)).await??;

        let report = FullReport {
            university: university.to_string(),
            department: department.to_string(),
            curriculum_analysis: research.curriculum,
            professor_analysis: research.professors,
            interview_trends: research.trends,
            strategy,
        };
        self.update(seq, token, |s| {
            s.steps.set(StepId::Synthesis, StepStatus::Completed);
            s.report = Some(report.clone());
        })?;
        Ok(report)
    }

    /// Applies `f` only while the run is current and not cancelled.
    fn update(
        &self,
        seq: u64,
        token: &CancellationToken,
        f: impl FnOnce(&mut Session),
    ) -> Result<(), RunError> {
        let mut session = self.session();
        if session.run_seq != seq || token.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        f(&mut session);
        Ok(())
    }
}

/// Awaits `fut` unless the token fires first; the losing future is dropped.
async fn checkpoint<F: Future>(token: &CancellationToken, fut: F) -> Result<F::Output, RunError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(RunError::Cancelled),
        out = fut => Ok(out),
    }
}
