//! Contracts and the `reqwest`-backed client for the REST backend.

mod http;
mod types;

pub use http::{ApiConfig, AuthHttpApi, HttpApi};
pub use types::{
    ActivityItem, ActivityPage, AnswerDto, Category, CertificationInfo, QuestionDto, QuizContent,
    StartResponse,
};

use async_trait::async_trait;

use cert_core::model::{AuthToken, CertificationSlug, FinalScore, ProgressRecord, User};

use crate::error::RequestError;

/// Identity endpoints. Takes explicit tokens: the identity-check path is
/// the only one allowed to drive session invalidation, and it runs while
/// the session store is still deciding what the current token is.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `GET /api/auth/me`: validate a bearer token.
    ///
    /// # Errors
    ///
    /// Returns `RequestError`; a 401 means the token is invalid.
    async fn me(&self, token: &AuthToken) -> Result<User, RequestError>;

    /// `POST /api/auth/logout`: best-effort server-side invalidation.
    ///
    /// # Errors
    ///
    /// Returns `RequestError`; callers treat failure as non-fatal.
    async fn logout(&self, token: &AuthToken) -> Result<(), RequestError>;
}

/// Certification and progress endpoints, authenticated implicitly via the
/// session store's current token.
#[async_trait]
pub trait CertificationApi: Send + Sync {
    /// `GET /api/certifications/{slug}/info` (auth optional).
    ///
    /// # Errors
    ///
    /// Returns `RequestError` on transport, status, or decode failure.
    async fn certification_info(
        &self,
        slug: &CertificationSlug,
    ) -> Result<CertificationInfo, RequestError>;

    /// `POST /api/certifications/{slug}/start` (auth required).
    ///
    /// # Errors
    ///
    /// Returns `RequestError` on transport, status, or decode failure.
    async fn start_certification(
        &self,
        slug: &CertificationSlug,
    ) -> Result<StartResponse, RequestError>;

    /// `GET /api/certifications/{slug}`: quiz reference data.
    ///
    /// # Errors
    ///
    /// Returns `RequestError` on transport, status, or decode failure.
    async fn quiz_content(&self, slug: &CertificationSlug) -> Result<QuizContent, RequestError>;

    /// `GET /api/progress` (auth required).
    ///
    /// # Errors
    ///
    /// Returns `RequestError` on transport, status, or decode failure.
    async fn user_progress(&self) -> Result<Vec<ProgressRecord>, RequestError>;

    /// `GET /api/users/activity?limit=N` (auth required).
    ///
    /// # Errors
    ///
    /// Returns `RequestError` on transport, status, or decode failure.
    async fn user_activity(&self, limit: u32) -> Result<ActivityPage, RequestError>;

    /// `POST /api/certifications/{slug}/complete`: submit the final
    /// accumulated score. Idempotent server-side, resubmitting the same
    /// payload is safe.
    ///
    /// # Errors
    ///
    /// Returns `RequestError` on transport, status, or decode failure.
    async fn submit_final_score(
        &self,
        slug: &CertificationSlug,
        score: &FinalScore,
    ) -> Result<ProgressRecord, RequestError>;
}
