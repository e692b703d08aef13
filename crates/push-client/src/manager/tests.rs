use std::sync::atomic::{AtomicUsize, Ordering};

use httpmock::Method::GET;
use httpmock::MockServer;
use serde_json::json;

use super::*;
use crate::testing::{FakePlatform, FakeSdk};

struct Harness {
    manager: Arc<PushClientManager>,
    sdk: Arc<FakeSdk>,
    platform: Arc<FakePlatform>,
    factory_calls: Arc<AtomicUsize>,
    _agent_rx: mpsc::Receiver<String>,
}

fn harness(platform: FakePlatform) -> Harness {
    let sdk = Arc::new(FakeSdk::default());
    let platform = Arc::new(platform);
    let factory_calls = Arc::new(AtomicUsize::new(0));
    let (agent_tx, agent_rx) = mpsc::channel(8);

    let sdk_for_factory = Arc::clone(&sdk);
    let calls = Arc::clone(&factory_calls);
    let factory: SdkFactory = Box::new(move || {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&sdk_for_factory) as Arc<dyn PushSdk>)
    });

    let manager = Arc::new(PushClientManager::new(
        factory,
        Arc::clone(&platform) as Arc<dyn PushPlatform>,
        agent_tx,
    ));
    Harness {
        manager,
        sdk,
        platform,
        factory_calls,
        _agent_rx: agent_rx,
    }
}

#[tokio::test]
async fn init_moves_to_initializing_and_is_idempotent() {
    let h = harness(FakePlatform::new(Permission::Granted));
    h.manager.init().await.unwrap();
    h.manager.init().await.unwrap();

    assert_eq!(h.manager.state(), RegistrationState::Initializing);
    assert_eq!(h.factory_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.platform.agents.load(Ordering::SeqCst), 1);
    assert!(!h.manager.get_registration_status());
}

#[tokio::test]
async fn init_without_background_messaging_fails_unsupported() {
    let mut platform = FakePlatform::new(Permission::Granted);
    platform.background = false;
    let h = harness(platform);

    let err = h.manager.init().await.unwrap_err();
    assert!(matches!(err, PushError::UnsupportedPlatform));
    assert_eq!(h.manager.state(), RegistrationState::Failed);
    assert_eq!(h.factory_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn sdk_construction_failure_is_retried_on_next_init() {
    let platform = Arc::new(FakePlatform::new(Permission::Granted));
    let attempts = Arc::new(AtomicUsize::new(0));
    let sdk = Arc::new(FakeSdk::default());
    let (tx, _rx) = mpsc::channel(1);

    let counter = Arc::clone(&attempts);
    let sdk_for_factory = Arc::clone(&sdk);
    let factory: SdkFactory = Box::new(move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(PushError::SdkInit("instance id is empty".into()))
        } else {
            Ok(Arc::clone(&sdk_for_factory) as Arc<dyn PushSdk>)
        }
    });
    let manager = PushClientManager::new(factory, platform, tx);

    let err = manager.init().await.unwrap_err();
    assert!(matches!(err, PushError::SdkInit(_)));
    assert_eq!(manager.state(), RegistrationState::Failed);

    manager.init().await.unwrap();
    assert_eq!(manager.state(), RegistrationState::Initializing);
}

#[tokio::test]
async fn start_registers_device() {
    let h = harness(FakePlatform::new(Permission::Granted));
    h.manager.start(None, None).await.unwrap();

    assert_eq!(h.manager.state(), RegistrationState::Started);
    assert!(h.manager.get_registration_status());
    assert_eq!(h.manager.device_id().as_deref(), Some("device-1"));
    assert_eq!(h.manager.user_id(), None);
}

#[tokio::test]
async fn concurrent_start_transitions_once() {
    let h = harness(FakePlatform::new(Permission::Granted));
    let mut states = h.manager.watch_state();

    let (a, b) = tokio::join!(h.manager.start(None, None), h.manager.start(None, None));
    a.unwrap();
    b.unwrap();

    assert_eq!(h.sdk.registrations.load(Ordering::SeqCst), 1);
    assert_eq!(h.factory_calls.load(Ordering::SeqCst), 1);
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), RegistrationState::Started);

    h.manager.subscribe_to_interest("admin-notifications").await.unwrap();
    h.manager.start(None, None).await.unwrap();
    assert_eq!(h.sdk.added.lock().unwrap().len(), 1);
    assert_eq!(h.manager.get_device_interests().len(), 1);
}

#[tokio::test]
async fn registration_failure_sets_failed_state() {
    let h = harness(FakePlatform::new(Permission::Granted));
    h.sdk.fail_register.store(true, Ordering::SeqCst);

    let err = h.manager.start(None, None).await.unwrap_err();
    assert!(matches!(err, PushError::Api { status: 500, .. }));
    assert_eq!(h.manager.state(), RegistrationState::Failed);
    assert!(!h.manager.get_registration_status());

    h.sdk.fail_register.store(false, Ordering::SeqCst);
    h.manager.start(None, None).await.unwrap();
    assert_eq!(h.manager.state(), RegistrationState::Started);
}

#[tokio::test]
async fn start_prompts_for_default_permission() {
    let h = harness(FakePlatform::new(Permission::Default));
    h.manager.start(None, None).await.unwrap();
    assert_eq!(h.platform.prompts.load(Ordering::SeqCst), 1);
    assert!(h.manager.get_registration_status());
}

#[tokio::test]
async fn denied_permission_disables_push_without_error_state() {
    let h = harness(FakePlatform::new(Permission::Default));
    *h.platform.permission.lock().unwrap() = Permission::Denied;

    assert_eq!(
        h.manager.request_notification_permission().await,
        Permission::Denied
    );
    assert_eq!(h.platform.prompts.load(Ordering::SeqCst), 0);

    assert!(matches!(
        h.manager.init().await,
        Err(PushError::PermissionDenied)
    ));
    assert!(matches!(
        h.manager.start(Some("admin-1"), None).await,
        Err(PushError::PermissionDenied)
    ));
    assert_eq!(h.manager.state(), RegistrationState::Uninitialized);
    assert_eq!(h.factory_calls.load(Ordering::SeqCst), 0);
    assert!(!h.manager.get_registration_status());
}

#[tokio::test]
async fn user_authentication_uses_token_provider() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/beams-auth")
                .query_param("user_id", "admin-1");
            then.status(200).json_body(json!({ "token": "tok" }));
        })
        .await;

    let h = harness(FakePlatform::new(Permission::Granted));
    h.manager
        .start(Some("admin-1"), Some(&server.url("/beams-auth")))
        .await
        .unwrap();

    assert_eq!(h.manager.user_id().as_deref(), Some("admin-1"));
    assert_eq!(
        h.sdk.user_calls.lock().unwrap().as_slice(),
        &[("admin-1".to_string(), "tok".to_string())]
    );
}

#[tokio::test]
async fn token_provider_failure_falls_back_to_anonymous() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/beams-auth");
            then.status(500);
        })
        .await;

    let h = harness(FakePlatform::new(Permission::Granted));
    h.manager
        .start(Some("admin-1"), Some(&server.url("/beams-auth")))
        .await
        .unwrap();

    assert!(h.manager.get_registration_status());
    assert_eq!(h.manager.user_id(), None);
    assert!(h.sdk.user_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_token_provider_falls_back_to_anonymous() {
    let h = harness(FakePlatform::new(Permission::Granted));
    h.manager.start(Some("admin-1"), None).await.unwrap();
    assert!(h.manager.get_registration_status());
    assert_eq!(h.manager.state(), RegistrationState::Started);
    assert_eq!(h.manager.user_id(), None);
    assert!(h.sdk.user_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn interest_calls_require_started() {
    let h = harness(FakePlatform::new(Permission::Granted));
    assert!(matches!(
        h.manager.subscribe_to_interest("x").await,
        Err(PushError::NotStarted)
    ));
    assert!(matches!(
        h.manager.unsubscribe_from_interest("x").await,
        Err(PushError::NotStarted)
    ));
    assert!(h.manager.get_device_interests().is_empty());
}

#[tokio::test]
async fn interest_round_trip_leaves_no_trace() {
    let h = harness(FakePlatform::new(Permission::Granted));
    h.manager.start(None, None).await.unwrap();

    h.manager.subscribe_to_interest("x").await.unwrap();
    h.manager.subscribe_to_interest("x").await.unwrap();
    assert_eq!(h.sdk.added.lock().unwrap().len(), 1);
    assert!(h.manager.get_device_interests().contains("x"));

    h.manager.unsubscribe_from_interest("x").await.unwrap();
    h.manager.unsubscribe_from_interest("x").await.unwrap();
    assert_eq!(h.sdk.removed.lock().unwrap().len(), 1);
    assert!(h.manager.get_device_interests().is_empty());
}

#[tokio::test]
async fn invalid_interest_names_are_rejected() {
    let h = harness(FakePlatform::new(Permission::Granted));
    h.manager.start(None, None).await.unwrap();
    assert!(matches!(
        h.manager.subscribe_to_interest("has space").await,
        Err(PushError::InvalidInterest(_))
    ));
    assert!(matches!(
        h.manager.subscribe_to_interest("").await,
        Err(PushError::InvalidInterest(_))
    ));
}

#[tokio::test]
async fn stop_clears_registration_and_is_safe_when_not_started() {
    let h = harness(FakePlatform::new(Permission::Granted));
    h.manager.stop().await;
    assert_eq!(h.manager.state(), RegistrationState::Uninitialized);

    h.manager.start(None, None).await.unwrap();
    h.manager.subscribe_to_interest("admin-notifications").await.unwrap();
    h.manager.stop().await;

    assert_eq!(h.manager.state(), RegistrationState::Stopped);
    assert_eq!(h.sdk.deleted.load(Ordering::SeqCst), 1);
    assert_eq!(h.manager.device_id(), None);
    assert!(h.manager.get_device_interests().is_empty());

    h.manager.start(None, None).await.unwrap();
    assert_eq!(h.manager.device_id().as_deref(), Some("device-2"));
    assert!(h.manager.get_device_interests().is_empty());
}

#[test]
fn interest_validation_accepts_vendor_charset() {
    assert!(validate_interest("admin-notifications").is_ok());
    assert!(validate_interest("route=A-B;bus@1,x.y_z").is_ok());
    assert!(validate_interest(&"a".repeat(MAX_INTEREST_LEN + 1)).is_err());
}
