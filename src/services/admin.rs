use crate::api::error::{ClientError, FieldError};
use crate::api::{AdminApi, ApiResult};
use crate::models::{
    AdminImage, AdminStats, ClaimImage, ClaimStatus, ClaimSummary, ImageDetail,
};
use std::sync::Arc;

/// Reviewer actions over all claims.
pub struct AdminConsole {
    api: Arc<dyn AdminApi>,
}

impl AdminConsole {
    pub fn new(api: Arc<dyn AdminApi>) -> Self {
        Self { api }
    }

    /// Sets a claim's status on the server, then mirrors it on `claim`.
    pub async fn change_status(&self, claim: &mut ClaimSummary, status: ClaimStatus) -> ApiResult<()> {
        if !status.is_admin_assignable() {
            return Err(ClientError::Validation(vec![FieldError::new(
                "status",
                format!("'{}' cannot be set by an administrator", status),
            )]));
        }

        self.api.update_claim_status(claim.id, status).await?;
        tracing::info!("Claim {} moved from {} to {}", claim.id, claim.status, status);
        claim.status = status;
        Ok(())
    }

    pub async fn stats(&self) -> ApiResult<AdminStats> {
        self.api.stats().await
    }

    pub async fn images(&self) -> ApiResult<Vec<AdminImage>> {
        self.api.list_images().await
    }

    pub async fn claim_images(&self, claim_id: i64) -> ApiResult<Vec<ClaimImage>> {
        self.api.claim_images(claim_id).await
    }

    pub async fn image_details(&self, image_id: i64) -> ApiResult<ImageDetail> {
        self.api.image_details(image_id).await
    }

    pub async fn delete_image(&self, image_id: i64) -> ApiResult<()> {
        self.api.delete_image(image_id).await?;
        tracing::info!("🗑️ Deleted image {}", image_id);
        Ok(())
    }
}

/// Claims whose fraud score routes them to manual review.
pub fn high_risk(claims: &[ClaimSummary]) -> Vec<&ClaimSummary> {
    claims.iter().filter(|c| c.is_high_risk()).collect()
}
