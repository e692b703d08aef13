//! Seam between the registration lifecycle and the vendor push SDK.

use std::sync::Arc;

use async_trait::async_trait;

use crate::PushError;

/// Device-level operations offered by a push-delivery vendor.
///
/// Implemented by [`crate::beams::BeamsClient`] in production and by
/// in-memory fakes in tests.
#[async_trait]
pub trait PushSdk: Send + Sync {
    /// Register this device with the vendor and return its device id.
    async fn register_device(&self) -> Result<String, PushError>;

    /// Associate the device with an authenticated user.
    async fn set_user_id(&self, device_id: &str, user_id: &str, token: &str)
    -> Result<(), PushError>;

    async fn add_interest(&self, device_id: &str, interest: &str) -> Result<(), PushError>;

    async fn remove_interest(&self, device_id: &str, interest: &str) -> Result<(), PushError>;

    /// Drop the device registration on the vendor side.
    async fn delete_device(&self, device_id: &str) -> Result<(), PushError>;
}

/// Constructs the SDK client on `init()`. Errors surface as `SdkInit`.
pub type SdkFactory = Box<dyn Fn() -> Result<Arc<dyn PushSdk>, PushError> + Send + Sync>;
