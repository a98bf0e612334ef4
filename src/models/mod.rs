pub mod analysis;
pub mod category;
pub mod verification;

pub use analysis::{AiAnalysis, AnalysisKind, DamageAnalysis, FraudAnalysis, VerificationFinal};
pub use category::{Category, CategoryScheme};
pub use verification::{
    AngleState, AngleUploadReceipt, VerificationAngleRecord, VerificationOutcome,
    VerificationSnapshot, VerificationStatusResponse,
};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use validator::Validate;

/// Fraud score above which the server routes a claim to manual review.
pub const HIGH_RISK_FRAUD_SCORE: f64 = 0.7;

/// Decodes a nested value, turning anything that does not fit `T` into `None`.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|v| serde_json::from_value(v).ok()))
}

/// Reads `null` as the type's default.
pub(crate) fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts RFC 3339 as well as the naive `isoformat()` timestamps the API
/// emits, reading the latter as UTC.
pub(crate) fn timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(|v| v.as_str()).and_then(parse_timestamp))
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Pending,
    Approved,
    Rejected,
    Review,
    Verified,
    #[serde(other)]
    Unknown,
}

impl ClaimStatus {
    pub const ADMIN_ASSIGNABLE: [ClaimStatus; 4] = [
        ClaimStatus::Pending,
        ClaimStatus::Approved,
        ClaimStatus::Rejected,
        ClaimStatus::Review,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Pending => "pending",
            ClaimStatus::Approved => "approved",
            ClaimStatus::Rejected => "rejected",
            ClaimStatus::Review => "review",
            ClaimStatus::Verified => "verified",
            ClaimStatus::Unknown => "unknown",
        }
    }

    pub fn is_admin_assignable(&self) -> bool {
        Self::ADMIN_ASSIGNABLE.contains(self)
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ClaimStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ClaimStatus::Pending),
            "approved" => Ok(ClaimStatus::Approved),
            "rejected" => Ok(ClaimStatus::Rejected),
            "review" => Ok(ClaimStatus::Review),
            "verified" => Ok(ClaimStatus::Verified),
            other => Err(format!("unknown claim status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimImage {
    pub id: i64,
    /// Absent from the per-claim listing, which is already scoped to one claim.
    #[serde(default)]
    pub claim_id: i64,
    #[serde(default, deserialize_with = "or_default")]
    pub image_path: String,
    #[serde(default, deserialize_with = "or_default")]
    pub image_hash: String,
    #[serde(default, deserialize_with = "or_default")]
    pub angle: String,
    #[serde(default)]
    pub ai_analysis: Option<serde_json::Value>,
    #[serde(default)]
    pub exif_metadata: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "timestamp")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// One uploaded image with the claim and claimant it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDetail {
    #[serde(flatten)]
    pub image: ClaimImage,
    pub claim: ImageClaim,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageClaim {
    pub id: i64,
    pub policy_number: String,
    pub status: ClaimStatus,
    #[serde(default)]
    pub accident_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "or_default")]
    pub location: String,
    #[serde(default, deserialize_with = "or_default")]
    pub description: String,
    #[serde(default)]
    pub damage_score: Option<f64>,
    #[serde(default)]
    pub fraud_score: Option<f64>,
    #[serde(default)]
    pub user: Option<ImageOwner>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageOwner {
    pub name: String,
    pub email: String,
}

/// A claim as the server reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimSummary {
    pub id: i64,
    #[serde(default)]
    pub user_id: i64,
    pub policy_number: String,
    pub accident_date: NaiveDate,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    pub status: ClaimStatus,
    #[serde(default)]
    pub damage_score: Option<f64>,
    #[serde(default)]
    pub cost_estimate: Option<f64>,
    #[serde(default)]
    pub fraud_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub ai_analysis: Option<AiAnalysis>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub images: Vec<ClaimImage>,
    #[serde(default, deserialize_with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(lenient::<D, Vec<T>>(deserializer)?.unwrap_or_default())
}

impl ClaimSummary {
    pub fn is_high_risk(&self) -> bool {
        self.fraud_score.is_some_and(|s| s > HIGH_RISK_FRAUD_SCORE)
    }

    pub fn damage(&self) -> Option<&DamageAnalysis> {
        self.ai_analysis.as_ref().and_then(|a| a.damage())
    }

    pub fn fraud(&self) -> Option<&FraudAnalysis> {
        self.ai_analysis.as_ref().and_then(|a| a.fraud())
    }
}

/// Fields of the new-claim form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ClaimForm {
    #[validate(length(min = 1, max = 64, message = "Policy number is required"))]
    pub policy_number: String,
    pub accident_date: NaiveDate,
    #[validate(length(min = 1, max = 255, message = "Location is required"))]
    pub location: String,
    #[validate(length(
        min = 1,
        max = 5000,
        message = "Description must be between 1 and 5000 characters"
    ))]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: ClaimStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminStats {
    #[serde(default)]
    pub total_claims: u64,
    #[serde(default)]
    pub pending_claims: u64,
    #[serde(default)]
    pub approved_claims: u64,
    #[serde(default)]
    pub rejected_claims: u64,
    #[serde(default)]
    pub review_claims: u64,
    #[serde(default)]
    pub high_risk_claims: u64,
    #[serde(default)]
    pub total_cost_estimates: f64,
}

/// Row of the admin image review table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminImage {
    pub id: i64,
    pub claim_id: i64,
    #[serde(default, deserialize_with = "or_default")]
    pub image_path: String,
    #[serde(default, deserialize_with = "or_default")]
    pub angle: String,
    #[serde(default)]
    pub ai_analysis: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "timestamp")]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub claim_policy: Option<String>,
    #[serde(default)]
    pub claim_status: Option<ClaimStatus>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Pdf,
    Json,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pdf" => Ok(ReportFormat::Pdf),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unsupported report format '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportOptions {
    pub format: ReportFormat,
    pub include_images: bool,
    pub include_analysis: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            format: ReportFormat::Pdf,
            include_images: true,
            include_analysis: true,
        }
    }
}

impl ReportOptions {
    pub fn file_name(&self, claim_id: i64) -> String {
        format!("claim_report_{}.{}", claim_id, self.format.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Registration {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default, deserialize_with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub user: Option<User>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_claim_summary_tolerates_partial_payload() {
        let claim: ClaimSummary = serde_json::from_value(json!({
            "id": 12,
            "user_id": 3,
            "policy_number": "POL-001",
            "accident_date": "2024-02-10",
            "location": "Main St",
            "description": "Rear-ended at a light",
            "status": "review",
            "fraud_score": 0.82,
            "ai_analysis": {"fraud_analysis": {"fraud_score": 0.82, "is_suspicious": true}},
            "images": null,
            "created_at": "2024-02-11T09:00:00.5",
            "updated_at": "2024-02-11T09:00:00+00:00"
        }))
        .unwrap();

        assert_eq!(claim.status, ClaimStatus::Review);
        assert!(claim.images.is_empty());
        assert!(claim.is_high_risk());
        assert!(claim.damage().is_none());
        assert!(claim.fraud().is_some());
        assert!(claim.created_at.is_some());
        assert!(claim.updated_at.is_some());
    }

    #[test]
    fn test_claim_image_listing_without_claim_id() {
        let images: Vec<ClaimImage> = serde_json::from_value(json!([{
            "id": 5,
            "image_path": "uploads/claims/7/front.jpg",
            "angle": "front",
            "ai_analysis": null,
            "uploaded_at": "2024-03-15T09:30:00.250000",
            "exif_metadata": {"Make": "Canon"}
        }, {
            "id": 6,
            "image_path": "uploads/claims/7/extra.jpg",
            "angle": null,
            "ai_analysis": null,
            "uploaded_at": null,
            "exif_metadata": null
        }]))
        .unwrap();

        assert_eq!(images[0].claim_id, 0);
        assert!(images[1].angle.is_empty());
        assert!(images[0].image_hash.is_empty());
        assert!(images[0].uploaded_at.is_some());
    }

    #[test]
    fn test_image_detail_nests_claim_and_owner() {
        let detail: ImageDetail = serde_json::from_value(json!({
            "id": 5,
            "claim_id": 7,
            "image_path": "uploads/claims/7/front.jpg",
            "image_hash": "9f2c",
            "angle": "front",
            "ai_analysis": null,
            "exif_metadata": null,
            "uploaded_at": "2024-03-15T09:30:00",
            "claim": {
                "id": 7,
                "policy_number": "POL-7",
                "status": "review",
                "accident_date": "2024-03-14",
                "location": "Harbor Rd",
                "description": "Hit a pole",
                "damage_score": 0.4,
                "fraud_score": null,
                "user": {"name": "Ada", "email": "ada@example.com"}
            }
        }))
        .unwrap();

        assert_eq!(detail.image.claim_id, 7);
        assert_eq!(detail.image.image_hash, "9f2c");
        assert_eq!(detail.claim.status, ClaimStatus::Review);
        assert_eq!(detail.claim.user.unwrap().email, "ada@example.com");
    }

    #[test]
    fn test_unknown_status_decodes() {
        let status: ClaimStatus = serde_json::from_value(json!("escalated")).unwrap();
        assert_eq!(status, ClaimStatus::Unknown);
        assert!(!ClaimStatus::Verified.is_admin_assignable());
        assert!(ClaimStatus::Review.is_admin_assignable());
    }

    #[test]
    fn test_claim_form_validation() {
        let form = ClaimForm {
            policy_number: String::new(),
            accident_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            location: "Elm Rd".to_string(),
            description: "Hail damage".to_string(),
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("policy_number"));
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert!(parse_timestamp("2024-03-01T10:15:00").is_some());
        assert!(parse_timestamp("2024-03-01T10:15:00.123456").is_some());
        assert!(parse_timestamp("2024-03-01T10:15:00Z").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_report_file_name() {
        let opts = ReportOptions {
            format: ReportFormat::Json,
            ..ReportOptions::default()
        };
        assert_eq!(opts.file_name(9), "claim_report_9.json");
    }
}
