//! Orchestrates one certification attempt end to end: cache-mediated
//! reads, the start/finish checkpoints against the backend, and the
//! resume path after a reload.
//!
//! Failure policy: `start` and `finish` are retried only at user request,
//! never automatically (automatic retry risks duplicate progress records
//! or double-scoring), and a failed call leaves the quiz session exactly
//! as it was so retrying is always safe.

use std::sync::Arc;
use tracing::debug;

use cert_core::model::{
    AnswerId, AnswerOutcome, CertificationSlug, FinalScore, ProgressRecord, QuestionId,
    QuizSession, UserId,
};
use cert_core::stats::ProgressOverview;

use crate::api::{ActivityPage, CertificationApi, CertificationInfo, StartResponse};
use crate::cache::{CacheKey, CacheOptions, RevalidatingCache, Snapshot};
use crate::error::QuizFlowError;
use crate::session_store::SessionStore;

pub struct QuizFlowService {
    api: Arc<dyn CertificationApi>,
    cache: Arc<RevalidatingCache>,
    session: Arc<SessionStore>,
}

impl QuizFlowService {
    #[must_use]
    pub fn new(
        api: Arc<dyn CertificationApi>,
        cache: Arc<RevalidatingCache>,
        session: Arc<SessionStore>,
    ) -> Self {
        Self {
            api,
            cache,
            session,
        }
    }

    fn current_user(&self) -> Option<UserId> {
        self.session.snapshot().user_id().cloned()
    }

    fn info_key(&self, slug: &CertificationSlug) -> CacheKey {
        CacheKey::endpoint("certification-info")
            .param("slug", slug)
            .identity(self.current_user().as_ref())
    }

    fn quiz_key(slug: &CertificationSlug) -> CacheKey {
        // quiz content is public reference data, shared across identities
        CacheKey::endpoint("quiz-content").param("slug", slug)
    }

    fn progress_key(&self) -> CacheKey {
        CacheKey::endpoint("user-progress").identity(self.current_user().as_ref())
    }

    fn activity_key(&self, limit: u32) -> CacheKey {
        CacheKey::endpoint("user-activity")
            .param("limit", limit)
            .identity(self.current_user().as_ref())
    }

    // Prior data stays usable through a failed refetch; a read only fails
    // when the entry has never held data at all.
    fn unwrap_snapshot<T>(snapshot: Snapshot<T>) -> Result<Arc<T>, QuizFlowError> {
        if let Some(data) = snapshot.data {
            return Ok(data);
        }
        match snapshot.error {
            Some(err) => Err(QuizFlowError::CachedRead(err)),
            None => Err(QuizFlowError::CachedRead(Arc::new(
                crate::error::RequestError::Http {
                    status: reqwest::StatusCode::NOT_FOUND,
                    status_text: "no data for key".to_string(),
                },
            ))),
        }
    }

    /// Read certification metadata plus the caller's attempt status.
    ///
    /// Uses a guaranteed-freshness subscription (identity-scoped key, no
    /// deduplication window) so the `has_started` decision is never made
    /// on stale data. Whether to route into the quiz at
    /// `current_question` is the caller's navigation policy.
    ///
    /// # Errors
    ///
    /// Returns `QuizFlowError::CachedRead` when the fetch fails and no
    /// usable data exists.
    pub async fn load_info(
        &self,
        slug: &CertificationSlug,
    ) -> Result<Arc<CertificationInfo>, QuizFlowError> {
        let api = Arc::clone(&self.api);
        let fetch_slug = slug.clone();
        let handle = self.cache.subscribe::<CertificationInfo, _, _>(
            Some(self.info_key(slug)),
            move || {
                let api = Arc::clone(&api);
                let slug = fetch_slug.clone();
                async move { api.certification_info(&slug).await }
            },
            CacheOptions::fresh(),
        );
        Self::unwrap_snapshot(handle.revalidate().await)
    }

    /// Fetch quiz reference data and build a fresh, not-yet-started
    /// session around it.
    ///
    /// # Errors
    ///
    /// Returns `QuizFlowError` on fetch failure or malformed reference
    /// data.
    pub async fn load_quiz(
        &self,
        slug: &CertificationSlug,
    ) -> Result<QuizSession, QuizFlowError> {
        let api = Arc::clone(&self.api);
        let fetch_slug = slug.clone();
        let handle = self.cache.subscribe::<crate::api::QuizContent, _, _>(
            Some(Self::quiz_key(slug)),
            move || {
                let api = Arc::clone(&api);
                let slug = fetch_slug.clone();
                async move { api.quiz_content(&slug).await }
            },
            CacheOptions::default(),
        );
        let content = Self::unwrap_snapshot(handle.ensure().await)?;
        let content = (*content).clone();
        let certification_id = content.id;
        let questions = content.into_questions()?;
        Ok(QuizSession::new(certification_id, slug.clone(), questions)?)
    }

    /// Create the server-side progress record and move the session into
    /// `InProgress`.
    ///
    /// The phase guard (not a lock) serializes concurrent starts; on
    /// failure the session rolls back to `NotStarted` with no partial
    /// state, and the cached info entry is left alone. On success the
    /// info entry is invalidated so the next read reflects
    /// `has_started = true`.
    ///
    /// # Errors
    ///
    /// Returns `QuizFlowError::Quiz` for phase violations and
    /// `QuizFlowError::Request` for backend failures.
    pub async fn start(&self, session: &mut QuizSession) -> Result<StartResponse, QuizFlowError> {
        session.begin_start()?;
        match self.api.start_certification(session.slug()).await {
            Ok(response) => {
                session.start_succeeded()?;
                self.cache.mutate(&self.info_key(session.slug()));
                debug!(slug = %session.slug(), "attempt started");
                Ok(response)
            }
            Err(err) => {
                session.start_failed();
                Err(err.into())
            }
        }
    }

    /// Rehydrate a session at the server-reported question index.
    ///
    /// # Errors
    ///
    /// Returns `QuizFlowError::Quiz` if the session already left
    /// `NotStarted`.
    pub fn resume(
        &self,
        session: &mut QuizSession,
        from_index: usize,
    ) -> Result<(), QuizFlowError> {
        session.resume(from_index)?;
        debug!(slug = %session.slug(), from_index, "attempt resumed");
        Ok(())
    }

    /// Record an answer for the current question.
    ///
    /// Synchronous and optimistic; no network involvement. The backend
    /// only learns the aggregate at completion.
    ///
    /// # Errors
    ///
    /// Returns `QuizFlowError::Quiz` when the answer is refused; the
    /// session is left untouched.
    pub fn answer(
        &self,
        session: &mut QuizSession,
        question_id: QuestionId,
        answer_id: AnswerId,
    ) -> Result<AnswerOutcome, QuizFlowError> {
        Ok(session.answer_question(question_id, answer_id)?)
    }

    /// Submit the final accumulated score.
    ///
    /// Idempotent at every level: once `Completed`, this returns the
    /// final score without touching the network; from `Completing` (a
    /// previous submission failed) it resubmits the identical payload.
    /// The locally computed score is never rolled back by a failure.
    ///
    /// # Errors
    ///
    /// Returns `QuizFlowError::Quiz` if questions remain unanswered, or
    /// `QuizFlowError::Request` when the submission fails (the session
    /// stays in `Completing` for manual retry).
    pub async fn finish(&self, session: &mut QuizSession) -> Result<FinalScore, QuizFlowError> {
        if session.is_completed() {
            return Ok(session.final_score());
        }
        let payload = session.begin_completion()?;
        match self.api.submit_final_score(session.slug(), &payload).await {
            Ok(record) => {
                session.completion_succeeded()?;
                session.reconcile(usize::try_from(record.current_question).unwrap_or(usize::MAX));
                self.cache.mutate(&self.info_key(session.slug()));
                self.cache.mutate(&self.progress_key());
                debug!(slug = %session.slug(), points = payload.points, "attempt completed");
                Ok(payload)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// All progress records for the current user, cache-mediated.
    ///
    /// # Errors
    ///
    /// Returns `QuizFlowError::CachedRead` when the fetch fails and no
    /// usable data exists.
    pub async fn load_progress(&self) -> Result<Arc<Vec<ProgressRecord>>, QuizFlowError> {
        let api = Arc::clone(&self.api);
        let handle = self.cache.subscribe::<Vec<ProgressRecord>, _, _>(
            Some(self.progress_key()),
            move || {
                let api = Arc::clone(&api);
                async move { api.user_progress().await }
            },
            CacheOptions::default(),
        );
        Self::unwrap_snapshot(handle.revalidate().await)
    }

    /// Dashboard overview derived from the cached progress records.
    ///
    /// # Errors
    ///
    /// Returns `QuizFlowError::CachedRead` when the records cannot be
    /// loaded.
    pub async fn progress_overview(&self) -> Result<ProgressOverview, QuizFlowError> {
        let records = self.load_progress().await?;
        Ok(ProgressOverview::from_records(&records))
    }

    /// Recent activity for the current user, cache-mediated.
    ///
    /// # Errors
    ///
    /// Returns `QuizFlowError::CachedRead` when the fetch fails and no
    /// usable data exists.
    pub async fn load_activity(&self, limit: u32) -> Result<Arc<ActivityPage>, QuizFlowError> {
        let api = Arc::clone(&self.api);
        let handle = self.cache.subscribe::<ActivityPage, _, _>(
            Some(self.activity_key(limit)),
            move || {
                let api = Arc::clone(&api);
                async move { api.user_activity(limit).await }
            },
            CacheOptions::default(),
        );
        Self::unwrap_snapshot(handle.revalidate().await)
    }
}
