use crate::api::error::{ClientError, FieldError};
use crate::api::{ApiResult, AuthApi};
use crate::models::{AuthSession, Credentials, Registration, User};
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;
use validator::Validate;

/// Who is signed in, shared by everything that makes authenticated calls.
///
/// Populated by a password login, an OAuth redirect or a stored token;
/// cleared on logout.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    session: Arc<RwLock<Option<AuthSession>>>,
}

impl AuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts signed in with a token whose user is not yet known.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            session: Arc::new(RwLock::new(Some(token_session(token.into())))),
        }
    }

    pub async fn sign_in(&self, session: AuthSession) {
        *self.session.write().await = Some(session);
    }

    pub async fn sign_in_with_token(&self, token: impl Into<String>) {
        self.sign_in(token_session(token.into())).await;
    }

    /// Reads the token out of an OAuth redirect such as
    /// `https://app/auth/callback?token=...`.
    pub async fn complete_oauth_callback(&self, callback_url: &str) -> ApiResult<()> {
        let url = Url::parse(callback_url).map_err(|e| {
            ClientError::Validation(vec![FieldError::new("callback_url", e.to_string())])
        })?;

        let mut token = None;
        let mut error = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "token" | "access_token" => token = Some(value.into_owned()),
                "error" | "error_description" => error = Some(value.into_owned()),
                _ => {}
            }
        }

        match (token, error) {
            (Some(token), _) if !token.is_empty() => {
                self.sign_in_with_token(token).await;
                tracing::info!("Signed in from OAuth callback");
                Ok(())
            }
            (_, Some(error)) => Err(ClientError::Unauthorized(error)),
            _ => Err(ClientError::Unauthorized(
                "OAuth callback did not include a token".to_string(),
            )),
        }
    }

    pub async fn set_user(&self, user: User) {
        if let Some(session) = self.session.write().await.as_mut() {
            session.user = Some(user);
        }
    }

    pub async fn sign_out(&self) {
        *self.session.write().await = None;
    }

    pub async fn token(&self) -> Option<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    /// Value for the `Authorization` header, if signed in.
    pub async fn bearer(&self) -> Option<String> {
        self.token().await.map(|t| format!("Bearer {}", t))
    }

    pub async fn user(&self) -> Option<User> {
        self.session.read().await.as_ref().and_then(|s| s.user.clone())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.is_some()
    }

    pub async fn is_admin(&self) -> bool {
        self.user().await.is_some_and(|u| u.is_admin)
    }
}

fn token_session(access_token: String) -> AuthSession {
    AuthSession {
        access_token,
        token_type: "bearer".to_string(),
        user: None,
    }
}

/// Login, logout and profile refresh over an `AuthApi`.
pub struct SessionService {
    api: Arc<dyn AuthApi>,
    context: AuthContext,
}

impl SessionService {
    pub fn new(api: Arc<dyn AuthApi>, context: AuthContext) -> Self {
        Self { api, context }
    }

    pub fn context(&self) -> &AuthContext {
        &self.context
    }

    pub async fn login(&self, credentials: &Credentials) -> ApiResult<AuthSession> {
        let session = self.api.login(credentials).await?;
        self.context.sign_in(session.clone()).await;
        tracing::info!("Logged in as {}", credentials.email);
        Ok(session)
    }

    pub async fn logout(&self) {
        self.context.sign_out().await;
        tracing::info!("Logged out");
    }

    pub async fn register(&self, registration: &Registration) -> ApiResult<User> {
        registration.validate()?;
        self.api.register(registration).await
    }

    /// Finishes an OAuth redirect: keeps the token, then loads the profile.
    pub async fn complete_oauth(&self, callback_url: &str) -> ApiResult<User> {
        self.context.complete_oauth_callback(callback_url).await?;
        self.refresh_profile().await
    }

    pub async fn refresh_profile(&self) -> ApiResult<User> {
        match self.api.current_user().await {
            Ok(user) => {
                self.context.set_user(user.clone()).await;
                Ok(user)
            }
            Err(e @ ClientError::Unauthorized(_)) => {
                tracing::warn!("Stored token rejected, signing out");
                self.context.sign_out().await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}
