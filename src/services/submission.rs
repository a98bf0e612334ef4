use crate::api::error::{ClientError, FieldError};
use crate::api::{ApiResult, ClaimsApi, NewClaim};
use crate::models::{ClaimForm, ClaimSummary};
use crate::services::upload_queue::UploadQueue;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use validator::Validate;

/// Turns a filled form and a complete photo queue into one claim creation
/// request.
pub struct SubmissionAssembler {
    api: Arc<dyn ClaimsApi>,
}

impl SubmissionAssembler {
    pub fn new(api: Arc<dyn ClaimsApi>) -> Self {
        Self { api }
    }

    /// Creates the claim. The queue is cleared only when the server accepted
    /// it; any failure leaves the staged photos in place for a retry.
    pub async fn submit(&self, form: &ClaimForm, queue: &mut UploadQueue) -> ApiResult<ClaimSummary> {
        check_form(form, Utc::now().date_naive())?;

        let missing = queue.missing_categories();
        if !missing.is_empty() {
            tracing::warn!("Claim {} not sent, missing {:?}", form.policy_number, missing);
            return Err(ClientError::MissingCategories(missing));
        }

        let request = NewClaim {
            form: form.clone(),
            images: queue.parts(),
        };

        let summary = self.api.create_claim(&request).await?;
        tracing::info!(
            "✅ Claim {} created for policy {} ({} photos)",
            summary.id,
            summary.policy_number,
            request.images.len()
        );

        queue.clear();
        Ok(summary)
    }
}

/// Field rules plus the accident date not lying after `today`.
pub fn check_form(form: &ClaimForm, today: NaiveDate) -> ApiResult<()> {
    let mut fields = match form.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => match ClientError::from(errors) {
            ClientError::Validation(fields) => fields,
            other => return Err(other),
        },
    };

    if form.accident_date > today {
        fields.push(FieldError::new(
            "accident_date",
            "Accident date cannot be in the future",
        ));
    }

    if fields.is_empty() {
        Ok(())
    } else {
        Err(ClientError::Validation(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(date: NaiveDate) -> ClaimForm {
        ClaimForm {
            policy_number: "POL-1001".to_string(),
            accident_date: date,
            location: "Main St & 5th".to_string(),
            description: "Rear-ended at a light".to_string(),
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_today_is_accepted() {
        assert!(check_form(&form(day(2024, 5, 1)), day(2024, 5, 1)).is_ok());
    }

    #[test]
    fn test_future_date_rejected() {
        let err = check_form(&form(day(2024, 5, 2)), day(2024, 5, 1)).unwrap_err();
        let fields = err.fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field.as_deref(), Some("accident_date"));
    }

    #[test]
    fn test_field_rules_and_date_reported_together() {
        let mut f = form(day(2030, 1, 1));
        f.location.clear();
        let err = check_form(&f, day(2024, 5, 1)).unwrap_err();
        let names: Vec<_> = err.fields().iter().filter_map(|f| f.field.clone()).collect();
        assert!(names.contains(&"location".to_string()));
        assert!(names.contains(&"accident_date".to_string()));
    }
}
