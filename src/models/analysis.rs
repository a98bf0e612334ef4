use super::lenient;
use serde::{Deserialize, Serialize};

/// Damage assessment produced server-side for a claim's photos.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DamageAnalysis {
    #[serde(default)]
    pub damage_score: Option<f64>,
    #[serde(default)]
    pub cost_estimate: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub detected_damages: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FraudAnalysis {
    #[serde(default)]
    pub fraud_score: Option<f64>,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub is_suspicious: Option<bool>,
    #[serde(default)]
    pub detected_issues: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Aggregate written onto the claim when a verification is submitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationFinal {
    #[serde(default)]
    pub total_images: u32,
    #[serde(default)]
    pub verified_images: u32,
    #[serde(default)]
    pub average_score: f64,
    #[serde(default)]
    pub all_verified: bool,
    #[serde(default)]
    pub recommendation: Option<String>,
}

/// The `ai_analysis` object nested in a claim.
///
/// Each kind decodes independently; a missing or malformed section becomes
/// `None` rather than failing the whole claim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysis {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub damage_analysis: Option<DamageAnalysis>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub fraud_analysis: Option<FraudAnalysis>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub car_verification_final: Option<VerificationFinal>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnalysisKind<'a> {
    Damage(&'a DamageAnalysis),
    Fraud(&'a FraudAnalysis),
}

impl AiAnalysis {
    pub fn damage(&self) -> Option<&DamageAnalysis> {
        self.damage_analysis.as_ref()
    }

    pub fn fraud(&self) -> Option<&FraudAnalysis> {
        self.fraud_analysis.as_ref()
    }

    pub fn verification(&self) -> Option<&VerificationFinal> {
        self.car_verification_final.as_ref()
    }

    pub fn kinds(&self) -> Vec<AnalysisKind<'_>> {
        let mut kinds = Vec::with_capacity(2);
        if let Some(d) = self.damage() {
            kinds.push(AnalysisKind::Damage(d));
        }
        if let Some(f) = self.fraud() {
            kinds.push(AnalysisKind::Fraud(f));
        }
        kinds
    }

    pub fn severity(&self) -> Option<&str> {
        self.damage().and_then(|d| d.severity.as_deref())
    }

    pub fn is_suspicious(&self) -> bool {
        self.fraud().and_then(|f| f.is_suspicious).unwrap_or(false)
    }
}
