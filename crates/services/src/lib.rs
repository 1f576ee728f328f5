#![forbid(unsafe_code)]

pub mod api;
pub mod cache;
pub mod client_services;
pub mod credentials;
pub mod error;
pub mod quiz_flow;
pub mod session_store;

pub use cert_core::Clock;

pub use api::{ApiConfig, AuthApi, AuthHttpApi, CertificationApi, HttpApi};
pub use cache::{CacheHandle, CacheKey, CacheOptions, RevalidatingCache, RevalidationTrigger, Snapshot};
pub use client_services::ClientServices;
pub use credentials::{
    CookieAttributes, CredentialStore, FileCredentialStore, InMemoryCredentialStore,
    PersistedCredentials, SameSite,
};
pub use error::{
    ApiConfigError, ClientServicesError, CredentialStoreError, QuizFlowError, RequestError,
};
pub use quiz_flow::QuizFlowService;
pub use session_store::{ListenerId, SessionStore};
