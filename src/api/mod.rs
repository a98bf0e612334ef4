pub mod client;
pub mod error;

pub use client::HttpClient;
pub use error::{ClientError, FieldError, Recovery};

use crate::models::{
    AdminImage, AdminStats, AngleUploadReceipt, AuthSession, Category, ClaimForm, ClaimImage,
    ClaimStatus, ClaimSummary, Credentials, ImageDetail, Registration, ReportOptions, User,
    VerificationOutcome, VerificationSnapshot,
};
use async_trait::async_trait;
use bytes::Bytes;

pub type ApiResult<T> = Result<T, ClientError>;

/// One file inside a multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPart {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

/// Everything `POST /claims/` needs in one request.
#[derive(Debug, Clone)]
pub struct NewClaim {
    pub form: ClaimForm,
    pub images: Vec<UploadPart>,
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> ApiResult<AuthSession>;

    async fn register(&self, registration: &Registration) -> ApiResult<User>;

    /// Profile of the user the current token belongs to.
    async fn current_user(&self) -> ApiResult<User>;
}

#[async_trait]
pub trait ClaimsApi: Send + Sync {
    async fn list_claims(&self) -> ApiResult<Vec<ClaimSummary>>;

    async fn get_claim(&self, claim_id: i64) -> ApiResult<ClaimSummary>;

    async fn create_claim(&self, claim: &NewClaim) -> ApiResult<ClaimSummary>;

    /// Rendered report (PDF or JSON) as raw bytes.
    async fn download_report(&self, claim_id: i64, options: &ReportOptions) -> ApiResult<Bytes>;
}

#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn update_claim_status(&self, claim_id: i64, status: ClaimStatus) -> ApiResult<()>;

    async fn stats(&self) -> ApiResult<AdminStats>;

    async fn list_images(&self) -> ApiResult<Vec<AdminImage>>;

    async fn claim_images(&self, claim_id: i64) -> ApiResult<Vec<ClaimImage>>;

    async fn image_details(&self, image_id: i64) -> ApiResult<ImageDetail>;

    async fn delete_image(&self, image_id: i64) -> ApiResult<()>;
}

#[async_trait]
pub trait VerificationApi: Send + Sync {
    async fn verification_status(&self, claim_id: i64) -> ApiResult<VerificationSnapshot>;

    async fn upload_angle(
        &self,
        claim_id: i64,
        angle: Category,
        file: &UploadPart,
    ) -> ApiResult<AngleUploadReceipt>;

    async fn submit_verification(&self, claim_id: i64) -> ApiResult<VerificationOutcome>;
}
