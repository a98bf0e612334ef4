use super::error::ClientError;
use super::{AdminApi, ApiResult, AuthApi, ClaimsApi, NewClaim, UploadPart, VerificationApi};
use crate::config::ClientConfig;
use crate::models::{
    AdminImage, AdminStats, AngleUploadReceipt, AuthSession, Category, ClaimImage, ClaimStatus,
    ClaimSummary, Credentials, ImageDetail, Registration, ReportOptions, StatusUpdate, User,
    VerificationOutcome, VerificationSnapshot, VerificationStatusResponse,
};
use crate::services::auth::AuthContext;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Instant;
use url::Url;

/// `reqwest`-backed implementation of every API trait.
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: Url,
    auth: AuthContext,
}

impl HttpClient {
    pub fn new(config: &ClientConfig, auth: AuthContext) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ClientError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Self::with_client(http, &config.api_base_url, auth)
    }

    pub fn with_client(http: reqwest::Client, base_url: &str, auth: AuthContext) -> ApiResult<Self> {
        // Url::join drops the last path segment unless the base ends with '/'
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized).map_err(|e| {
            ClientError::Validation(vec![super::FieldError::new(
                "api_base_url",
                format!("'{}' is not a valid URL: {}", base_url, e),
            )])
        })?;

        Ok(Self {
            http,
            base_url,
            auth,
        })
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::Network(format!("Invalid endpoint '{}': {}", path, e)))
    }

    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth.bearer().await {
            Some(bearer) => request.header(reqwest::header::AUTHORIZATION, bearer),
            None => request,
        }
    }

    /// Sends the request and turns non-2xx answers into `ClientError`s.
    async fn execute(&self, request: RequestBuilder, label: &str) -> ApiResult<Response> {
        let started = Instant::now();
        let response = self.authorize(request).await.send().await.map_err(|e| {
            tracing::warn!("{} failed: {}", label, e);
            ClientError::from(e)
        })?;

        let status = response.status();
        tracing::debug!("{} -> {} in {:?}", label, status, started.elapsed());

        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        let error = ClientError::from_response(status.as_u16(), &body);
        tracing::warn!("{} rejected with {}: {}", label, status, error);
        Err(error)
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        label: &str,
    ) -> ApiResult<T> {
        let response = self.execute(request, label).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| ClientError::Decode(format!("{}: {}", label, e)))
    }
}

fn file_part(file: &UploadPart) -> ApiResult<Part> {
    Part::bytes(file.bytes.to_vec())
        .file_name(file.file_name.clone())
        .mime_str(&file.mime_type)
        .map_err(|e| {
            ClientError::Validation(vec![super::FieldError::new(
                file.file_name.clone(),
                format!("Invalid content type '{}': {}", file.mime_type, e),
            )])
        })
}

#[async_trait]
impl AuthApi for HttpClient {
    async fn login(&self, credentials: &Credentials) -> ApiResult<AuthSession> {
        let url = self.endpoint("auth/login")?;
        self.execute_json(self.http.post(url).json(credentials), "POST auth/login")
            .await
    }

    async fn register(&self, registration: &Registration) -> ApiResult<User> {
        let url = self.endpoint("auth/register")?;
        self.execute_json(self.http.post(url).json(registration), "POST auth/register")
            .await
    }

    async fn current_user(&self) -> ApiResult<User> {
        let url = self.endpoint("auth/me")?;
        self.execute_json(self.http.get(url), "GET auth/me").await
    }
}

#[async_trait]
impl ClaimsApi for HttpClient {
    async fn list_claims(&self) -> ApiResult<Vec<ClaimSummary>> {
        let url = self.endpoint("claims/")?;
        self.execute_json(self.http.get(url), "GET claims/").await
    }

    async fn get_claim(&self, claim_id: i64) -> ApiResult<ClaimSummary> {
        let url = self.endpoint(&format!("claims/{}", claim_id))?;
        self.execute_json(self.http.get(url), "GET claims/{id}").await
    }

    async fn create_claim(&self, claim: &NewClaim) -> ApiResult<ClaimSummary> {
        let url = self.endpoint("claims/")?;
        let mut form = Form::new()
            .text("policy_number", claim.form.policy_number.clone())
            .text(
                "accident_date",
                claim.form.accident_date.format("%Y-%m-%d").to_string(),
            )
            .text("location", claim.form.location.clone())
            .text("description", claim.form.description.clone());

        for image in &claim.images {
            form = form.part("images", file_part(image)?);
        }

        tracing::info!(
            "📤 Submitting claim {} with {} photos",
            claim.form.policy_number,
            claim.images.len()
        );
        self.execute_json(self.http.post(url).multipart(form), "POST claims/")
            .await
    }

    async fn download_report(&self, claim_id: i64, options: &ReportOptions) -> ApiResult<Bytes> {
        let url = self.endpoint(&format!("claims/{}/report", claim_id))?;
        let request = self.http.get(url).query(&[
            ("format", options.format.as_str().to_string()),
            ("include_images", options.include_images.to_string()),
            ("include_analysis", options.include_analysis.to_string()),
        ]);
        let response = self.execute(request, "GET claims/{id}/report").await?;
        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl AdminApi for HttpClient {
    async fn update_claim_status(&self, claim_id: i64, status: ClaimStatus) -> ApiResult<()> {
        let url = self.endpoint(&format!("admin/claims/{}/status", claim_id))?;
        self.execute(
            self.http.put(url).json(&StatusUpdate { status }),
            "PUT admin/claims/{id}/status",
        )
        .await?;
        Ok(())
    }

    async fn stats(&self) -> ApiResult<AdminStats> {
        let url = self.endpoint("admin/stats")?;
        self.execute_json(self.http.get(url), "GET admin/stats").await
    }

    async fn list_images(&self) -> ApiResult<Vec<AdminImage>> {
        let url = self.endpoint("admin/images")?;
        self.execute_json(self.http.get(url), "GET admin/images").await
    }

    async fn claim_images(&self, claim_id: i64) -> ApiResult<Vec<ClaimImage>> {
        let url = self.endpoint(&format!("admin/claims/{}/images", claim_id))?;
        self.execute_json(self.http.get(url), "GET admin/claims/{id}/images")
            .await
    }

    async fn image_details(&self, image_id: i64) -> ApiResult<ImageDetail> {
        let url = self.endpoint(&format!("admin/images/{}", image_id))?;
        self.execute_json(self.http.get(url), "GET admin/images/{id}")
            .await
    }

    async fn delete_image(&self, image_id: i64) -> ApiResult<()> {
        let url = self.endpoint(&format!("admin/images/{}", image_id))?;
        self.execute(self.http.delete(url), "DELETE admin/images/{id}")
            .await?;
        Ok(())
    }
}

#[async_trait]
impl VerificationApi for HttpClient {
    async fn verification_status(&self, claim_id: i64) -> ApiResult<VerificationSnapshot> {
        let url = self.endpoint(&format!("api/car-verification/status/{}", claim_id))?;
        let status: VerificationStatusResponse = self
            .execute_json(self.http.get(url), "GET car-verification/status")
            .await?;
        Ok(status.into())
    }

    async fn upload_angle(
        &self,
        claim_id: i64,
        angle: Category,
        file: &UploadPart,
    ) -> ApiResult<AngleUploadReceipt> {
        let url = self.endpoint(&format!("api/car-verification/upload/{}", claim_id))?;
        let form = Form::new().part("file", file_part(file)?);
        let request = self
            .http
            .post(url)
            .query(&[("angle", angle.as_str())])
            .multipart(form);
        self.execute_json(request, "POST car-verification/upload")
            .await
    }

    async fn submit_verification(&self, claim_id: i64) -> ApiResult<VerificationOutcome> {
        let url = self.endpoint(&format!("api/car-verification/submit/{}", claim_id))?;
        self.execute_json(self.http.post(url), "POST car-verification/submit")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpClient {
        HttpClient::with_client(reqwest::Client::new(), base, AuthContext::new()).unwrap()
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let c = client("https://claims.example.com/api/v1");
        assert_eq!(
            c.endpoint("/claims/12").unwrap().as_str(),
            "https://claims.example.com/api/v1/claims/12"
        );
        assert_eq!(
            c.endpoint("api/car-verification/status/3").unwrap().as_str(),
            "https://claims.example.com/api/v1/api/car-verification/status/3"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = HttpClient::with_client(reqwest::Client::new(), "not a url", AuthContext::new())
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[test]
    fn test_file_part_rejects_bad_mime() {
        let part = UploadPart {
            file_name: "a.jpg".to_string(),
            mime_type: "definitely not a mime".to_string(),
            bytes: Bytes::from_static(b"x"),
        };
        assert!(file_part(&part).is_err());
    }
}
