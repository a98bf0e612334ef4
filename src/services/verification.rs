use crate::api::error::{ClientError, FieldError};
use crate::api::{ApiResult, UploadPart, VerificationApi};
use crate::models::{
    AngleState, AngleUploadReceipt, Category, CategoryScheme, VerificationAngleRecord,
    VerificationOutcome, VerificationSnapshot,
};
use crate::services::upload_queue::LocalFile;
use crate::utils::in_flight::InFlight;
use crate::utils::validation::{MAX_IMAGE_SIZE, validate_image};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct TrackerState {
    applied_seq: u64,
    snapshot: Option<VerificationSnapshot>,
}

/// Per-claim view of the server's angle verification.
///
/// Every poll replaces the cached snapshot wholesale. Polls may complete out
/// of order; a response older than the one already applied is discarded.
pub struct VerificationTracker {
    api: Arc<dyn VerificationApi>,
    claim_id: i64,
    state: RwLock<TrackerState>,
    next_seq: AtomicU64,
    in_flight: InFlight<Category>,
    max_file_size: usize,
}

impl VerificationTracker {
    pub fn new(api: Arc<dyn VerificationApi>, claim_id: i64) -> Self {
        Self {
            api,
            claim_id,
            state: RwLock::new(TrackerState::default()),
            next_seq: AtomicU64::new(0),
            in_flight: InFlight::new(),
            max_file_size: MAX_IMAGE_SIZE,
        }
    }

    pub fn with_max_file_size(mut self, max_file_size: usize) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    pub fn claim_id(&self) -> i64 {
        self.claim_id
    }

    /// Polls the status endpoint once and returns the snapshot now in effect.
    pub async fn refresh(&self) -> ApiResult<VerificationSnapshot> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let fetched = self.api.verification_status(self.claim_id).await?;

        let mut state = self.state.write().await;
        if seq > state.applied_seq {
            tracing::debug!(
                "Applied verification poll #{} for claim {}: {}/{} verified",
                seq,
                self.claim_id,
                fetched.verified_count(),
                fetched.total_angles
            );
            state.applied_seq = seq;
            state.snapshot = Some(fetched);
        } else {
            tracing::debug!(
                "Discarded stale verification poll #{} (already at #{})",
                seq,
                state.applied_seq
            );
        }

        state
            .snapshot
            .clone()
            .ok_or_else(|| ClientError::Decode("No verification status available".to_string()))
    }

    pub async fn snapshot(&self) -> Option<VerificationSnapshot> {
        self.state.read().await.snapshot.clone()
    }

    pub async fn records(&self) -> Vec<VerificationAngleRecord> {
        self.state
            .read()
            .await
            .snapshot
            .as_ref()
            .map(|s| s.records.clone())
            .unwrap_or_default()
    }

    pub async fn overall_progress(&self) -> f64 {
        self.state
            .read()
            .await
            .snapshot
            .as_ref()
            .map_or(0.0, |s| s.overall_progress())
    }

    pub async fn progress_label(&self) -> String {
        format!("{:.0}% Complete", self.overall_progress().await)
    }

    /// Shown only once every angle is verified.
    pub async fn completion_badge(&self) -> Option<&'static str> {
        (self.overall_progress().await >= 100.0).then_some("All angles verified")
    }

    pub async fn angle_state(&self, angle: Category) -> AngleState {
        if self.in_flight.is_active(&angle) {
            return AngleState::Uploading;
        }
        let state = self.state.read().await;
        match state.snapshot.as_ref() {
            Some(s) => AngleState::from_record(s.record(angle.as_str()), s.threshold),
            None => AngleState::NotStarted,
        }
    }

    /// Uploads one photo for `angle`, then re-polls.
    ///
    /// A failed upload leaves the cached snapshot untouched. Once the server
    /// has stored the photo the receipt is returned even if the re-poll fails.
    pub async fn upload_one(&self, angle: Category, file: LocalFile) -> ApiResult<AngleUploadReceipt> {
        let scheme = CategoryScheme::VehicleAngles;
        if !scheme.allows(angle) {
            return Err(ClientError::CategoryNotAllowed {
                category: angle,
                scheme,
            });
        }

        let checked = validate_image(
            &file.name,
            file.content_type.as_deref(),
            &file.bytes,
            self.max_file_size,
        )
        .map_err(|e| {
            ClientError::Validation(vec![FieldError::new(file.name.clone(), e.message)])
        })?;

        let guard = self
            .in_flight
            .try_begin(angle)
            .ok_or(ClientError::UploadInProgress(angle))?;

        let part = UploadPart {
            file_name: checked.file_name,
            mime_type: checked.mime_type,
            bytes: file.bytes,
        };

        tracing::info!("📤 Uploading {} angle for claim {}", angle, self.claim_id);
        let receipt = self
            .api
            .upload_angle(self.claim_id, angle, &part)
            .await
            .map_err(|e| {
                tracing::warn!("Upload of {} angle failed: {}", angle, e);
                upload_failure(e)
            })?;

        drop(guard);
        tracing::info!("✅ Uploaded {} angle for claim {}", angle, self.claim_id);

        self.refresh_after(&format!("{} upload", angle)).await;
        Ok(receipt)
    }

    /// Asks the server for a final decision over all uploaded angles.
    pub async fn submit(&self) -> ApiResult<VerificationOutcome> {
        let outcome = self.api.submit_verification(self.claim_id).await?;
        tracing::info!(
            "Verification submitted for claim {}: {}",
            self.claim_id,
            outcome.verification_status.recommendation
        );
        self.refresh_after("submission").await;
        Ok(outcome)
    }

    /// Re-polls after a write the server already accepted. A failure leaves
    /// the cached snapshot as it was.
    async fn refresh_after(&self, action: &str) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(
                "Status refresh after {} for claim {} failed: {}",
                action,
                self.claim_id,
                e
            );
        }
    }
}

/// Server rejections become `Upload` carrying the server's text as-is.
fn upload_failure(error: ClientError) -> ClientError {
    match error {
        ClientError::Server { message, .. } => ClientError::Upload(message),
        ClientError::NotFound(m) | ClientError::Forbidden(m) | ClientError::Unauthorized(m) => {
            ClientError::Upload(m)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_failure_keeps_server_text() {
        let err = upload_failure(ClientError::Server {
            status: 400,
            message: "Only 62.5% similar to the reference".to_string(),
            fields: vec![],
        });
        assert_eq!(err.to_string(), "Only 62.5% similar to the reference");

        let err = upload_failure(ClientError::NotFound("Claim not found".to_string()));
        assert!(matches!(err, ClientError::Upload(ref m) if m == "Claim not found"));

        let err = upload_failure(ClientError::Network("timed out".to_string()));
        assert!(matches!(err, ClientError::Network(_)));
    }
}
