//! Push client registration lifecycle.
//!
//! `PushClientManager` owns the vendor SDK client, the device registration
//! and the registered interests. Lifecycle calls are serialized through an
//! async lock so concurrent `start()` callers observe a single transition.
//! Failures become state (`Failed`) or warnings; nothing here panics.

#[cfg(test)]
mod tests;

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};

use crate::platform::PushPlatform;
use crate::sdk::{PushSdk, SdkFactory};
use crate::token::TokenProvider;
use crate::{Permission, PushError, RegistrationState};

const MAX_INTEREST_LEN: usize = 164;

#[derive(Default)]
struct Registration {
    sdk: Option<Arc<dyn PushSdk>>,
    device_id: Option<String>,
    user_id: Option<String>,
    interests: BTreeSet<String>,
}

/// Shared push client. Construct once per application and hand out `Arc`s.
pub struct PushClientManager {
    factory: SdkFactory,
    platform: Arc<dyn PushPlatform>,
    tokens: TokenProvider,
    token_provider_url: Option<String>,
    agent_sink: mpsc::Sender<String>,
    lifecycle: tokio::sync::Mutex<()>,
    registration: Mutex<Registration>,
    state_tx: watch::Sender<RegistrationState>,
}

impl PushClientManager {
    /// `agent_sink` receives raw envelopes from the background agent.
    pub fn new(
        factory: SdkFactory,
        platform: Arc<dyn PushPlatform>,
        agent_sink: mpsc::Sender<String>,
    ) -> Self {
        let (state_tx, _) = watch::channel(RegistrationState::Uninitialized);
        Self {
            factory,
            platform,
            tokens: TokenProvider::new(),
            token_provider_url: None,
            agent_sink,
            lifecycle: tokio::sync::Mutex::new(()),
            registration: Mutex::new(Registration::default()),
            state_tx,
        }
    }

    /// Default token-provider endpoint used when `start()` gets none.
    pub fn with_token_provider_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.token_provider_url = (!url.trim().is_empty()).then_some(url);
        self
    }

    pub fn state(&self) -> RegistrationState {
        *self.state_tx.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<RegistrationState> {
        self.state_tx.subscribe()
    }

    pub fn get_registration_status(&self) -> bool {
        self.state() == RegistrationState::Started
    }

    pub fn permission(&self) -> Permission {
        self.platform.permission()
    }

    pub fn device_id(&self) -> Option<String> {
        self.registration().device_id.clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.registration().user_id.clone()
    }

    /// Currently registered interests; empty unless started.
    pub fn get_device_interests(&self) -> BTreeSet<String> {
        if !self.get_registration_status() {
            return BTreeSet::new();
        }
        self.registration().interests.clone()
    }

    /// Ask the platform for delivery permission.
    ///
    /// Settled answers are returned as-is. Denial is a normal outcome.
    pub async fn request_notification_permission(&self) -> Permission {
        let current = self.platform.permission();
        if current.is_settled() {
            return current;
        }
        let answer = self.platform.request_permission().await;
        if answer == Permission::Denied {
            tracing::info!("Notification permission denied; push delivery disabled");
        }
        answer
    }

    /// Allocate the SDK client and register the background agent.
    pub async fn init(&self) -> Result<(), PushError> {
        let _guard = self.lifecycle.lock().await;
        self.init_locked().await
    }

    async fn init_locked(&self) -> Result<(), PushError> {
        match self.state() {
            RegistrationState::Initializing | RegistrationState::Started => return Ok(()),
            RegistrationState::Failed => {
                tracing::info!("Retrying push client initialization after failure");
                self.set_state(RegistrationState::Uninitialized);
            }
            RegistrationState::Uninitialized | RegistrationState::Stopped => {}
        }

        if self.platform.permission() == Permission::Denied {
            tracing::debug!("Push init skipped: permission denied");
            return Err(PushError::PermissionDenied);
        }

        if !self.platform.supports_background_messaging() {
            tracing::warn!("Push client disabled: platform lacks background messaging");
            self.set_state(RegistrationState::Failed);
            return Err(PushError::UnsupportedPlatform);
        }

        let sdk = match (self.factory)() {
            Ok(sdk) => sdk,
            Err(e) => {
                tracing::warn!(error = %e, "Push SDK construction failed");
                self.set_state(RegistrationState::Failed);
                return Err(match e {
                    PushError::SdkInit(msg) => PushError::SdkInit(msg),
                    other => PushError::SdkInit(other.to_string()),
                });
            }
        };

        if let Err(e) = self
            .platform
            .register_background_agent(self.agent_sink.clone())
            .await
        {
            tracing::warn!(error = %e, "Background agent registration failed");
            self.set_state(RegistrationState::Failed);
            return Err(e);
        }

        self.registration().sdk = Some(sdk);
        self.set_state(RegistrationState::Initializing);
        tracing::info!("Push client initialized");
        Ok(())
    }

    /// Register the device and move to `Started`.
    ///
    /// A supplied `user_id` is authenticated through the token provider;
    /// any failure there leaves the device registered anonymously.
    pub async fn start(
        &self,
        user_id: Option<&str>,
        token_provider_url: Option<&str>,
    ) -> Result<(), PushError> {
        let _guard = self.lifecycle.lock().await;
        if self.state() == RegistrationState::Started {
            tracing::debug!("Push client already started");
            return Ok(());
        }

        let permission = self.request_notification_permission().await;
        if permission != Permission::Granted {
            tracing::info!(?permission, "Push start skipped: permission not granted");
            return Err(PushError::PermissionDenied);
        }

        self.init_locked().await?;

        let Some(sdk) = self.registration().sdk.clone() else {
            self.set_state(RegistrationState::Failed);
            return Err(PushError::SdkInit("SDK missing after init".into()));
        };

        let device_id = match sdk.register_device().await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "Push device registration failed");
                self.set_state(RegistrationState::Failed);
                return Err(e);
            }
        };

        {
            let mut reg = self.registration();
            reg.device_id = Some(device_id.clone());
            reg.user_id = None;
            reg.interests.clear();
        }
        self.set_state(RegistrationState::Started);
        tracing::info!(device_id = %device_id, "Push client started");

        if let Some(user_id) = user_id.map(str::trim).filter(|u| !u.is_empty()) {
            let endpoint = token_provider_url
                .map(str::to_string)
                .or_else(|| self.token_provider_url.clone());
            match endpoint {
                None => {
                    tracing::warn!(
                        user_id,
                        "No token provider configured; continuing anonymously"
                    );
                }
                Some(endpoint) => {
                    self.associate_user(sdk.as_ref(), &device_id, user_id, &endpoint)
                        .await;
                }
            }
        }

        Ok(())
    }

    async fn associate_user(
        &self,
        sdk: &dyn PushSdk,
        device_id: &str,
        user_id: &str,
        endpoint: &str,
    ) {
        match self.authenticate(sdk, device_id, user_id, endpoint).await {
            Ok(()) => {
                self.registration().user_id = Some(user_id.to_string());
                tracing::info!(user_id, "Push device associated with user");
            }
            Err(e) => {
                tracing::warn!(
                    user_id, error = %e,
                    "Push user authentication failed; continuing anonymously"
                );
            }
        }
    }

    async fn authenticate(
        &self,
        sdk: &dyn PushSdk,
        device_id: &str,
        user_id: &str,
        endpoint: &str,
    ) -> Result<(), PushError> {
        let token = self.tokens.fetch(endpoint, user_id).await?;
        sdk.set_user_id(device_id, user_id, &token).await
    }

    /// Subscribe the device to `interest`. Subscribing twice is a no-op.
    pub async fn subscribe_to_interest(&self, interest: &str) -> Result<(), PushError> {
        self.ensure_started()?;
        validate_interest(interest)?;

        let _guard = self.lifecycle.lock().await;
        let (sdk, device_id) = self.started_registration()?;
        if self.registration().interests.contains(interest) {
            return Ok(());
        }

        sdk.add_interest(&device_id, interest).await?;
        self.registration().interests.insert(interest.to_string());
        tracing::info!(interest, "Subscribed to push interest");
        Ok(())
    }

    /// Unsubscribe from `interest`. Absent interests are a no-op.
    pub async fn unsubscribe_from_interest(&self, interest: &str) -> Result<(), PushError> {
        self.ensure_started()?;

        let _guard = self.lifecycle.lock().await;
        let (sdk, device_id) = self.started_registration()?;
        if !self.registration().interests.contains(interest) {
            return Ok(());
        }

        sdk.remove_interest(&device_id, interest).await?;
        self.registration().interests.remove(interest);
        tracing::info!(interest, "Unsubscribed from push interest");
        Ok(())
    }

    /// Move `Started` to `Stopped`, dropping the device registration.
    pub async fn stop(&self) {
        let _guard = self.lifecycle.lock().await;
        if self.state() != RegistrationState::Started {
            return;
        }

        let (sdk, device_id) = {
            let mut reg = self.registration();
            let taken = std::mem::take(&mut *reg);
            (taken.sdk, taken.device_id)
        };
        if let (Some(sdk), Some(device_id)) = (sdk, device_id) {
            if let Err(e) = sdk.delete_device(&device_id).await {
                tracing::warn!(device_id = %device_id, error = %e, "Failed to delete push device");
            }
        }
        self.platform.unregister_background_agent().await;
        self.set_state(RegistrationState::Stopped);
        tracing::info!("Push client stopped");
    }

    /// Teardown hook: stop if started and release the background agent.
    pub async fn shutdown(&self) {
        self.stop().await;
        let _guard = self.lifecycle.lock().await;
        self.registration().sdk = None;
        self.platform.unregister_background_agent().await;
    }

    fn ensure_started(&self) -> Result<(), PushError> {
        if self.get_registration_status() {
            Ok(())
        } else {
            Err(PushError::NotStarted)
        }
    }

    /// Re-check under the lifecycle lock; `stop()` may have won the race.
    fn started_registration(&self) -> Result<(Arc<dyn PushSdk>, String), PushError> {
        self.ensure_started()?;
        let reg = self.registration();
        match (&reg.sdk, &reg.device_id) {
            (Some(sdk), Some(id)) => Ok((Arc::clone(sdk), id.clone())),
            _ => Err(PushError::NotStarted),
        }
    }

    fn registration(&self) -> MutexGuard<'_, Registration> {
        self.registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: RegistrationState) {
        let prev = self.state_tx.send_replace(next);
        if prev != next {
            tracing::debug!(from = prev.as_str(), to = next.as_str(), "Push client state changed");
        }
    }
}

/// Interest names follow the vendor's charset and length limits.
pub fn validate_interest(interest: &str) -> Result<(), PushError> {
    let valid = !interest.is_empty()
        && interest.len() <= MAX_INTEREST_LEN
        && interest
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-=@,.;".contains(c));
    if valid {
        Ok(())
    } else {
        Err(PushError::InvalidInterest(interest.to_string()))
    }
}
