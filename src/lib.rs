pub mod api;
pub mod config;
pub mod models;
pub mod services;
pub mod utils;

use crate::api::{ApiResult, HttpClient};
use crate::config::ClientConfig;
use crate::models::CategoryScheme;
use crate::services::admin::AdminConsole;
use crate::services::auth::{AuthContext, SessionService};
use crate::services::preview::PreviewRegistry;
use crate::services::submission::SubmissionAssembler;
use crate::services::upload_queue::UploadQueue;
use crate::services::verification::VerificationTracker;
use std::sync::Arc;

/// Shared handles every screen of the client works from.
#[derive(Clone)]
pub struct AppState {
    pub config: ClientConfig,
    pub client: Arc<HttpClient>,
    pub auth: AuthContext,
    pub previews: PreviewRegistry,
}

impl AppState {
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        let auth = match config.auth_token.as_deref() {
            Some(token) => AuthContext::with_token(token),
            None => AuthContext::new(),
        };
        let client = Arc::new(HttpClient::new(&config, auth.clone())?);
        Ok(Self {
            config,
            client,
            auth,
            previews: PreviewRegistry::new(),
        })
    }

    pub fn sessions(&self) -> SessionService {
        SessionService::new(self.client.clone(), self.auth.clone())
    }

    pub fn upload_queue(&self, scheme: CategoryScheme) -> UploadQueue {
        UploadQueue::new(scheme, self.config.upload_limits(), self.previews.clone())
    }

    pub fn assembler(&self) -> SubmissionAssembler {
        SubmissionAssembler::new(self.client.clone())
    }

    pub fn tracker(&self, claim_id: i64) -> VerificationTracker {
        VerificationTracker::new(self.client.clone(), claim_id)
            .with_max_file_size(self.config.max_file_size)
    }

    pub fn admin(&self) -> AdminConsole {
        AdminConsole::new(self.client.clone())
    }
}
