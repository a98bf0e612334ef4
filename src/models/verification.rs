use super::{lenient, timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

fn unit_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|v| v.as_f64())
        .filter(|s| s.is_finite())
        .map(|s| s.clamp(0.0, 1.0))
        .unwrap_or(0.0))
}

/// Server-computed outcome for one required angle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationAngleRecord {
    /// Filled from the map key of the status payload.
    #[serde(default)]
    pub angle_id: String,
    #[serde(default)]
    pub uploaded: bool,
    #[serde(default)]
    pub verified: bool,
    #[serde(rename = "score", default, deserialize_with = "unit_score")]
    pub similarity_score: f64,
    #[serde(default, deserialize_with = "timestamp")]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image_id: Option<i64>,
}

/// Body of `GET /api/car-verification/status/{claim_id}` as sent.
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationStatusResponse {
    pub claim_id: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub verified_angles: u32,
    #[serde(default)]
    pub total_angles: u32,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub overall_score: f64,
    #[serde(default)]
    pub angles: BTreeMap<String, VerificationAngleRecord>,
}

/// Read-only copy of a claim's verification state, replaced on every poll.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationSnapshot {
    pub claim_id: i64,
    pub status: String,
    pub verified_angles: u32,
    pub total_angles: u32,
    pub threshold: f64,
    pub overall_score: f64,
    pub records: Vec<VerificationAngleRecord>,
}

impl From<VerificationStatusResponse> for VerificationSnapshot {
    fn from(resp: VerificationStatusResponse) -> Self {
        let records = resp
            .angles
            .into_iter()
            .map(|(angle_id, mut record)| {
                record.angle_id = angle_id;
                record
            })
            .collect();

        Self {
            claim_id: resp.claim_id,
            status: resp.status,
            verified_angles: resp.verified_angles,
            total_angles: resp.total_angles,
            threshold: resp.threshold,
            overall_score: resp.overall_score,
            records,
        }
    }
}

impl VerificationSnapshot {
    pub fn record(&self, angle_id: &str) -> Option<&VerificationAngleRecord> {
        self.records.iter().find(|r| r.angle_id == angle_id)
    }

    /// Verified count derived from the records, not the server's tally.
    pub fn verified_count(&self) -> usize {
        self.records.iter().filter(|r| r.verified).count()
    }

    /// `verified / total * 100`, where total falls back to the record count
    /// when the server omits it.
    pub fn overall_progress(&self) -> f64 {
        let total = if self.total_angles > 0 {
            self.total_angles as usize
        } else {
            self.records.len()
        };
        if total == 0 {
            return 0.0;
        }
        (self.verified_count() as f64 / total as f64 * 100.0).min(100.0)
    }
}

/// Client-side view of where a single angle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleState {
    NotStarted,
    Uploading,
    Uploaded,
    Verified,
    RejectedPendingReupload,
}

impl AngleState {
    pub fn from_record(record: Option<&VerificationAngleRecord>, threshold: f64) -> Self {
        match record {
            None => AngleState::NotStarted,
            Some(r) if !r.uploaded => AngleState::NotStarted,
            Some(r) if r.verified => AngleState::Verified,
            Some(r) if r.similarity_score > 0.0 && r.similarity_score < threshold => {
                AngleState::RejectedPendingReupload
            }
            Some(_) => AngleState::Uploaded,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadScores {
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub similarity_score: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub status: Option<String>,
}

/// Response of a per-angle upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AngleUploadReceipt {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub image_id: Option<i64>,
    #[serde(default)]
    pub angle: String,
    #[serde(default)]
    pub classification_percentage: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub scores: Option<UploadScores>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AngleResult {
    pub angle: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub image_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalVerification {
    #[serde(default)]
    pub total_images: u32,
    #[serde(default)]
    pub verified_images: u32,
    #[serde(default)]
    pub average_score: f64,
    #[serde(default)]
    pub all_verified: bool,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default)]
    pub individual_results: Vec<AngleResult>,
}

/// Response of `POST /api/car-verification/submit/{claim_id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    #[serde(default)]
    pub message: String,
    pub claim_id: i64,
    #[serde(default)]
    pub verification_status: FinalVerification,
    #[serde(default)]
    pub next_steps: String,
}
