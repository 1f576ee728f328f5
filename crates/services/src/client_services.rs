use std::path::PathBuf;
use std::sync::Arc;

use cert_core::Clock;

use crate::api::{ApiConfig, AuthHttpApi, CertificationApi, HttpApi};
use crate::cache::RevalidatingCache;
use crate::credentials::{CredentialStore, FileCredentialStore};
use crate::error::ClientServicesError;
use crate::quiz_flow::QuizFlowService;
use crate::session_store::SessionStore;

/// Assembles the client-side service graph.
///
/// Everything is an explicit instance wired here, no module-level
/// globals, so tests can build isolated graphs with fakes at the
/// `CredentialStore` / `AuthApi` / `CertificationApi` seams.
#[derive(Clone)]
pub struct ClientServices {
    session: Arc<SessionStore>,
    cache: Arc<RevalidatingCache>,
    quiz_flow: Arc<QuizFlowService>,
    api: Arc<HttpApi>,
}

impl ClientServices {
    #[must_use]
    pub fn new(config: ApiConfig, credentials: Arc<dyn CredentialStore>, clock: Clock) -> Self {
        let auth_api = Arc::new(AuthHttpApi::new(config.clone()));
        let session = Arc::new(SessionStore::new(credentials, auth_api, clock));
        let api = Arc::new(HttpApi::new(config, Arc::clone(&session)));
        let cache = Arc::new(RevalidatingCache::new());
        let quiz_flow = Arc::new(QuizFlowService::new(
            Arc::clone(&api) as Arc<dyn CertificationApi>,
            Arc::clone(&cache),
            Arc::clone(&session),
        ));

        Self {
            session,
            cache,
            quiz_flow,
            api,
        }
    }

    /// Build from `CERTQUIZ_API_BASE_URL` with file-backed credentials.
    ///
    /// # Errors
    ///
    /// Returns `ClientServicesError` if the API configuration is missing
    /// or invalid.
    pub fn from_env(credential_path: impl Into<PathBuf>) -> Result<Self, ClientServicesError> {
        let config = ApiConfig::from_env()?;
        let credentials = Arc::new(FileCredentialStore::new(credential_path));
        Ok(Self::new(config, credentials, Clock::default()))
    }

    /// Rehydrate the session from persisted credentials; see
    /// [`SessionStore::initialize`].
    pub async fn initialize(&self) {
        self.session.initialize().await;
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<RevalidatingCache> {
        &self.cache
    }

    #[must_use]
    pub fn quiz_flow(&self) -> &Arc<QuizFlowService> {
        &self.quiz_flow
    }

    #[must_use]
    pub fn api(&self) -> &Arc<HttpApi> {
        &self.api
    }
}
