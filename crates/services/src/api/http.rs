use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::env;
use std::sync::Arc;
use tracing::debug;

use cert_core::model::{AuthToken, CertificationSlug, FinalScore, ProgressRecord, User};

use crate::api::types::{ActivityPage, CertificationInfo, QuizContent, StartResponse};
use crate::api::{AuthApi, CertificationApi};
use crate::error::{ApiConfigError, RequestError};
use crate::session_store::SessionStore;

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: Url,
}

impl ApiConfig {
    /// Parse a base URL.
    ///
    /// # Errors
    ///
    /// Returns `ApiConfigError::InvalidBaseUrl` if the URL does not parse.
    pub fn new(base_url: &str) -> Result<Self, ApiConfigError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
        })
    }

    /// Read `CERTQUIZ_API_BASE_URL` from the environment.
    ///
    /// # Errors
    ///
    /// Returns `ApiConfigError::MissingBaseUrl` when unset or blank, or
    /// `ApiConfigError::InvalidBaseUrl` when it does not parse.
    pub fn from_env() -> Result<Self, ApiConfigError> {
        let raw = env::var("CERTQUIZ_API_BASE_URL").map_err(|_| ApiConfigError::MissingBaseUrl)?;
        if raw.trim().is_empty() {
            return Err(ApiConfigError::MissingBaseUrl);
        }
        Self::new(raw.trim())
    }
}

fn join_url(base: &Url, path: &str) -> Result<Url, RequestError> {
    base.join(path).map_err(RequestError::InvalidUrl)
}

fn ensure_success(response: Response) -> Result<Response, RequestError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(RequestError::Http {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
        })
    }
}

async fn send(builder: RequestBuilder) -> Result<Response, RequestError> {
    let response = builder.send().await.map_err(RequestError::Network)?;
    ensure_success(response)
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RequestError> {
    response.json().await.map_err(RequestError::Decode)
}

//
// ─── IDENTITY CLIENT ───────────────────────────────────────────────────────────
//

/// Client for the identity endpoints. Holds no session state of its own;
/// the token is always passed in explicitly.
pub struct AuthHttpApi {
    client: Client,
    base_url: Url,
}

impl AuthHttpApi {
    #[must_use]
    pub fn new(config: ApiConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url,
        }
    }
}

#[async_trait]
impl AuthApi for AuthHttpApi {
    async fn me(&self, token: &AuthToken) -> Result<User, RequestError> {
        let url = join_url(&self.base_url, "/api/auth/me")?;
        let response = send(self.client.get(url).bearer_auth(token.expose())).await?;
        decode(response).await
    }

    async fn logout(&self, token: &AuthToken) -> Result<(), RequestError> {
        let url = join_url(&self.base_url, "/api/auth/logout")?;
        send(self.client.post(url).bearer_auth(token.expose())).await?;
        Ok(())
    }
}

//
// ─── FEATURE CLIENT ────────────────────────────────────────────────────────────
//

/// Authenticated request layer for the certification endpoints.
///
/// Every request carries the session store's current auth headers merged
/// under any caller-supplied ones (caller headers win). Errors map to the
/// uniform [`RequestError`] taxonomy and always propagate; a 401 here is
/// the caller's problem, not a session-wide sign-out.
pub struct HttpApi {
    client: Client,
    base_url: Url,
    session: Arc<SessionStore>,
}

impl HttpApi {
    #[must_use]
    pub fn new(config: ApiConfig, session: Arc<SessionStore>) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url,
            session,
        }
    }

    /// Execute a request and decode its JSON body.
    ///
    /// # Errors
    ///
    /// Returns `RequestError` on transport, status, or decode failure.
    pub async fn request_json<T, B>(
        &self,
        method: Method,
        path: &str,
        extra_headers: HeaderMap,
        body: Option<&B>,
    ) -> Result<T, RequestError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        let url = join_url(&self.base_url, path)?;
        debug!(%method, %url, "api request");

        let mut headers = self.session.auth_headers();
        for (name, value) in &extra_headers {
            headers.insert(name.clone(), value.clone());
        }

        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = send(builder).await?;
        decode(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RequestError> {
        self.request_json::<T, ()>(Method::GET, path, HeaderMap::new(), None)
            .await
    }
}

#[async_trait]
impl CertificationApi for HttpApi {
    async fn certification_info(
        &self,
        slug: &CertificationSlug,
    ) -> Result<CertificationInfo, RequestError> {
        self.get_json(&format!("/api/certifications/{slug}/info")).await
    }

    async fn start_certification(
        &self,
        slug: &CertificationSlug,
    ) -> Result<StartResponse, RequestError> {
        self.request_json::<StartResponse, ()>(
            Method::POST,
            &format!("/api/certifications/{slug}/start"),
            HeaderMap::new(),
            None,
        )
        .await
    }

    async fn quiz_content(&self, slug: &CertificationSlug) -> Result<QuizContent, RequestError> {
        self.get_json(&format!("/api/certifications/{slug}")).await
    }

    async fn user_progress(&self) -> Result<Vec<ProgressRecord>, RequestError> {
        self.get_json("/api/progress").await
    }

    async fn user_activity(&self, limit: u32) -> Result<ActivityPage, RequestError> {
        self.get_json(&format!("/api/users/activity?limit={limit}")).await
    }

    async fn submit_final_score(
        &self,
        slug: &CertificationSlug,
        score: &FinalScore,
    ) -> Result<ProgressRecord, RequestError> {
        self.request_json(
            Method::POST,
            &format!("/api/certifications/{slug}/complete"),
            HeaderMap::new(),
            Some(score),
        )
        .await
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
