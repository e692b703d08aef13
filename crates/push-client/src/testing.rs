//! In-memory SDK and platform for exercising [`PushClientManager`] without
//! a network. Enabled for downstream tests by the `test-util` feature.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{Permission, PushClientManager, PushError, PushPlatform, PushSdk, SdkFactory};

/// Records every SDK call. Device ids are `device-1`, `device-2`, ...
#[derive(Default)]
pub struct FakeSdk {
    pub registrations: AtomicUsize,
    pub user_calls: Mutex<Vec<(String, String)>>,
    pub added: Mutex<Vec<String>>,
    pub removed: Mutex<Vec<String>>,
    pub deleted: AtomicUsize,
    pub fail_register: AtomicBool,
}

#[async_trait]
impl PushSdk for FakeSdk {
    async fn register_device(&self) -> Result<String, PushError> {
        // Yield so concurrent callers genuinely interleave.
        tokio::task::yield_now().await;
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(PushError::Api {
                status: 500,
                message: "boom".into(),
            });
        }
        let n = self.registrations.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("device-{n}"))
    }

    async fn set_user_id(
        &self,
        _device_id: &str,
        user_id: &str,
        token: &str,
    ) -> Result<(), PushError> {
        lock(&self.user_calls).push((user_id.to_string(), token.to_string()));
        Ok(())
    }

    async fn add_interest(&self, _device_id: &str, interest: &str) -> Result<(), PushError> {
        lock(&self.added).push(interest.to_string());
        Ok(())
    }

    async fn remove_interest(&self, _device_id: &str, interest: &str) -> Result<(), PushError> {
        lock(&self.removed).push(interest.to_string());
        Ok(())
    }

    async fn delete_device(&self, _device_id: &str) -> Result<(), PushError> {
        self.deleted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Platform whose prompt resolves to a fixed answer.
pub struct FakePlatform {
    pub background: bool,
    pub permission: Mutex<Permission>,
    pub prompts: AtomicUsize,
    pub agents: AtomicUsize,
    prompt_answer: Permission,
}

impl FakePlatform {
    pub fn new(permission: Permission) -> Self {
        Self {
            background: true,
            permission: Mutex::new(permission),
            prompts: AtomicUsize::new(0),
            agents: AtomicUsize::new(0),
            prompt_answer: Permission::Granted,
        }
    }

    pub fn answering(mut self, answer: Permission) -> Self {
        self.prompt_answer = answer;
        self
    }
}

#[async_trait]
impl PushPlatform for FakePlatform {
    fn supports_background_messaging(&self) -> bool {
        self.background
    }

    fn permission(&self) -> Permission {
        *lock(&self.permission)
    }

    async fn request_permission(&self) -> Permission {
        let mut current = lock(&self.permission);
        if !current.is_settled() {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            *current = self.prompt_answer;
        }
        *current
    }

    async fn register_background_agent(
        &self,
        _sink: mpsc::Sender<String>,
    ) -> Result<(), PushError> {
        self.agents.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn unregister_background_agent(&self) {}
}

/// Factory handing out `sdk` on every call.
pub fn factory(sdk: Arc<FakeSdk>) -> SdkFactory {
    Box::new(move || -> Result<Arc<dyn PushSdk>, PushError> {
        Ok(Arc::clone(&sdk) as Arc<dyn PushSdk>)
    })
}

/// Manager over the fakes plus the receiving end of its agent channel.
pub fn manager(
    platform: Arc<FakePlatform>,
    sdk: FakeSdk,
) -> (Arc<PushClientManager>, Arc<FakeSdk>, mpsc::Receiver<String>) {
    let sdk = Arc::new(sdk);
    let (tx, rx) = mpsc::channel(8);
    let push = PushClientManager::new(factory(Arc::clone(&sdk)), platform, tx);
    (Arc::new(push), sdk, rx)
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
