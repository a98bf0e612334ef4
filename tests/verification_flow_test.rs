use async_trait::async_trait;
use claim_desk::api::{ApiResult, ClientError, UploadPart, VerificationApi};
use claim_desk::models::verification::FinalVerification;
use claim_desk::models::{
    AngleState, AngleUploadReceipt, Category, VerificationAngleRecord, VerificationOutcome,
    VerificationSnapshot,
};
use claim_desk::services::upload_queue::LocalFile;
use claim_desk::services::verification::VerificationTracker;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

const CLAIM_ID: i64 = 9;
const THRESHOLD: f64 = 0.7;

fn record(angle: &str, uploaded: bool, verified: bool, score: f64) -> VerificationAngleRecord {
    VerificationAngleRecord {
        angle_id: angle.to_string(),
        uploaded,
        verified,
        similarity_score: score,
        uploaded_at: None,
        image_id: uploaded.then_some(1),
    }
}

fn snapshot_of(records: Vec<VerificationAngleRecord>) -> VerificationSnapshot {
    let verified = records.iter().filter(|r| r.verified).count() as u32;
    VerificationSnapshot {
        claim_id: CLAIM_ID,
        status: "pending".to_string(),
        verified_angles: verified,
        total_angles: 4,
        threshold: THRESHOLD,
        overall_score: 0.0,
        records,
    }
}

/// In-memory verification backend: uploads mark an angle verified unless a
/// rejection is registered for it.
#[derive(Default)]
struct MockVerification {
    angles: Mutex<BTreeMap<String, VerificationAngleRecord>>,
    scripted: Mutex<VecDeque<(u64, VerificationSnapshot)>>,
    rejections: Mutex<HashMap<Category, String>>,
    front_gate: Option<Arc<Notify>>,
    status_down: AtomicBool,
    status_calls: AtomicUsize,
    upload_calls: AtomicUsize,
}

impl MockVerification {
    fn fresh() -> Self {
        let angles = ["front", "back", "left", "right"]
            .into_iter()
            .map(|a| (a.to_string(), record(a, false, false, 0.0)))
            .collect();
        Self {
            angles: Mutex::new(angles),
            ..Default::default()
        }
    }

    fn set(&self, rec: VerificationAngleRecord) {
        self.angles.lock().unwrap().insert(rec.angle_id.clone(), rec);
    }

    fn current(&self) -> VerificationSnapshot {
        snapshot_of(self.angles.lock().unwrap().values().cloned().collect())
    }
}

#[async_trait]
impl VerificationApi for MockVerification {
    async fn verification_status(&self, _claim_id: i64) -> ApiResult<VerificationSnapshot> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.status_down.load(Ordering::SeqCst) {
            return Err(ClientError::Network("connection reset".to_string()));
        }
        let scripted = self.scripted.lock().unwrap().pop_front();
        match scripted {
            Some((delay_ms, snapshot)) => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(snapshot)
            }
            None => Ok(self.current()),
        }
    }

    async fn upload_angle(
        &self,
        _claim_id: i64,
        angle: Category,
        file: &UploadPart,
    ) -> ApiResult<AngleUploadReceipt> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        if angle == Category::Front {
            if let Some(gate) = &self.front_gate {
                gate.notified().await;
            }
        }

        let rejection = self.rejections.lock().unwrap().get(&angle).cloned();
        if let Some(message) = rejection {
            return Err(ClientError::Server {
                status: 400,
                message,
                fields: vec![],
            });
        }

        self.set(record(angle.as_str(), true, true, 0.92));
        Ok(AngleUploadReceipt {
            message: format!("{} image uploaded ({})", angle, file.file_name),
            image_id: Some(7),
            angle: angle.to_string(),
            classification_percentage: 92.0,
            scores: None,
        })
    }

    async fn submit_verification(&self, claim_id: i64) -> ApiResult<VerificationOutcome> {
        Ok(VerificationOutcome {
            message: "Verification submitted".to_string(),
            claim_id,
            verification_status: FinalVerification {
                total_images: 4,
                verified_images: 4,
                average_score: 0.9,
                all_verified: true,
                recommendation: "APPROVE".to_string(),
                individual_results: vec![],
            },
            next_steps: "Claim forwarded for payout".to_string(),
        })
    }
}

fn jpeg(name: &str, seed: u8) -> LocalFile {
    LocalFile::new(name, vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, seed])
}

#[tokio::test]
async fn test_successful_upload_advances_progress() {
    let api = Arc::new(MockVerification::fresh());
    let tracker = VerificationTracker::new(api.clone(), CLAIM_ID);

    assert_eq!(tracker.overall_progress().await, 0.0);
    tracker.refresh().await.unwrap();
    assert_eq!(tracker.progress_label().await, "0% Complete");
    assert_eq!(tracker.angle_state(Category::Front).await, AngleState::NotStarted);

    let receipt = tracker
        .upload_one(Category::Front, jpeg("front.jpg", 1))
        .await
        .unwrap();

    assert_eq!(receipt.image_id, Some(7));
    assert_eq!(tracker.overall_progress().await, 25.0);
    assert_eq!(tracker.progress_label().await, "25% Complete");
    assert_eq!(tracker.angle_state(Category::Front).await, AngleState::Verified);
    assert_eq!(api.status_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failed_upload_leaves_state_unchanged() {
    let api = Arc::new(MockVerification::fresh());
    let message = "Image does not look like the left side of a vehicle (41% similar)";
    api.rejections
        .lock()
        .unwrap()
        .insert(Category::Left, message.to_string());
    let tracker = VerificationTracker::new(api.clone(), CLAIM_ID);
    tracker.refresh().await.unwrap();
    let before = tracker.snapshot().await;

    let err = tracker
        .upload_one(Category::Left, jpeg("left.jpg", 2))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Upload(_)));
    assert_eq!(err.to_string(), message);
    assert_eq!(tracker.snapshot().await, before);
    assert_eq!(tracker.angle_state(Category::Left).await, AngleState::NotStarted);
    assert_eq!(api.status_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stale_poll_is_discarded() {
    let api = Arc::new(MockVerification::fresh());
    let old = snapshot_of(vec![
        record("front", false, false, 0.0),
        record("back", false, false, 0.0),
    ]);
    let new = snapshot_of(vec![
        record("front", true, true, 0.9),
        record("back", true, true, 0.85),
    ]);
    {
        let mut scripted = api.scripted.lock().unwrap();
        scripted.push_back((150, old));
        scripted.push_back((0, new.clone()));
    }
    let tracker = VerificationTracker::new(api.clone(), CLAIM_ID);

    let (first, second) = tokio::join!(tracker.refresh(), tracker.refresh());

    // The slow first poll lands last and must not overwrite the newer one.
    assert_eq!(second.unwrap(), new);
    assert_eq!(first.unwrap(), new);
    assert_eq!(tracker.snapshot().await, Some(new));
    assert_eq!(tracker.overall_progress().await, 50.0);
}

#[tokio::test]
async fn test_same_angle_uploads_are_serialized() {
    let gate = Arc::new(Notify::new());
    let api = Arc::new(MockVerification {
        front_gate: Some(gate.clone()),
        ..MockVerification::fresh()
    });
    let tracker = VerificationTracker::new(api.clone(), CLAIM_ID);
    tracker.refresh().await.unwrap();

    let (first, (second, other_angle)) = tokio::join!(
        tracker.upload_one(Category::Front, jpeg("front.jpg", 1)),
        async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            assert_eq!(tracker.angle_state(Category::Front).await, AngleState::Uploading);

            let second = tracker
                .upload_one(Category::Front, jpeg("front_again.jpg", 2))
                .await;
            let other = tracker
                .upload_one(Category::Back, jpeg("back.jpg", 3))
                .await;
            gate.notify_one();
            (second, other)
        }
    );

    assert!(first.is_ok());
    assert!(matches!(
        second,
        Err(ClientError::UploadInProgress(Category::Front))
    ));
    assert!(other_angle.is_ok());
    assert_eq!(api.upload_calls.load(Ordering::SeqCst), 2);
    assert_eq!(tracker.angle_state(Category::Front).await, AngleState::Verified);
    assert_eq!(tracker.overall_progress().await, 50.0);
}

#[tokio::test]
async fn test_half_verified_claim() {
    let api = Arc::new(MockVerification::fresh());
    api.set(record("front", true, true, 0.91));
    api.set(record("back", true, true, 0.88));
    api.set(record("left", true, false, 0.42));
    let tracker = VerificationTracker::new(api, CLAIM_ID);
    tracker.refresh().await.unwrap();

    assert_eq!(tracker.progress_label().await, "50% Complete");
    assert!(tracker.completion_badge().await.is_none());
    assert_eq!(
        tracker.angle_state(Category::Left).await,
        AngleState::RejectedPendingReupload
    );
    assert_eq!(tracker.angle_state(Category::Right).await, AngleState::NotStarted);
    assert_eq!(tracker.records().await.len(), 4);
}

#[tokio::test]
async fn test_all_angles_verified_shows_badge() {
    let api = Arc::new(MockVerification::fresh());
    for angle in ["front", "back", "left", "right"] {
        api.set(record(angle, true, true, 0.9));
    }
    let tracker = VerificationTracker::new(api, CLAIM_ID);
    tracker.refresh().await.unwrap();

    assert_eq!(tracker.progress_label().await, "100% Complete");
    assert!(tracker.completion_badge().await.is_some());
}

#[tokio::test]
async fn test_bad_input_never_reaches_server() {
    let api = Arc::new(MockVerification::fresh());
    let tracker = VerificationTracker::new(api.clone(), CLAIM_ID);

    let err = tracker
        .upload_one(Category::Rear, jpeg("rear.jpg", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::CategoryNotAllowed { .. }));

    let err = tracker
        .upload_one(Category::Front, LocalFile::new("notes.txt", "hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));

    let err = tracker
        .upload_one(Category::Front, LocalFile::new("empty.jpg", Vec::<u8>::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));

    assert_eq!(api.upload_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_submit_refreshes_status() {
    let api = Arc::new(MockVerification::fresh());
    let tracker = VerificationTracker::new(api.clone(), CLAIM_ID);

    let outcome = tracker.submit().await.unwrap();

    assert!(outcome.verification_status.all_verified);
    assert_eq!(outcome.verification_status.recommendation, "APPROVE");
    assert!(tracker.snapshot().await.is_some());
    assert_eq!(api.status_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stored_upload_survives_failed_refresh() {
    let api = Arc::new(MockVerification::fresh());
    let tracker = VerificationTracker::new(api.clone(), CLAIM_ID);
    tracker.refresh().await.unwrap();
    let before = tracker.snapshot().await;
    api.status_down.store(true, Ordering::SeqCst);

    let receipt = tracker
        .upload_one(Category::Front, jpeg("front.jpg", 1))
        .await
        .unwrap();

    assert_eq!(receipt.image_id, Some(7));
    assert_eq!(api.upload_calls.load(Ordering::SeqCst), 1);
    assert_eq!(api.status_calls.load(Ordering::SeqCst), 2);
    // The cached view stays at the last good poll until the next refresh.
    assert_eq!(tracker.snapshot().await, before);
    assert_eq!(tracker.angle_state(Category::Front).await, AngleState::NotStarted);

    api.status_down.store(false, Ordering::SeqCst);
    tracker.refresh().await.unwrap();
    assert_eq!(tracker.angle_state(Category::Front).await, AngleState::Verified);
}

#[tokio::test]
async fn test_submission_outcome_survives_failed_refresh() {
    let api = Arc::new(MockVerification::fresh());
    api.status_down.store(true, Ordering::SeqCst);
    let tracker = VerificationTracker::new(api.clone(), CLAIM_ID);

    let outcome = tracker.submit().await.unwrap();

    assert_eq!(outcome.claim_id, CLAIM_ID);
    assert_eq!(outcome.verification_status.recommendation, "APPROVE");
    assert!(tracker.snapshot().await.is_none());
    assert_eq!(api.status_calls.load(Ordering::SeqCst), 1);
}
