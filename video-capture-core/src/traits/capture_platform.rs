use std::sync::Arc;

use crate::interop::InteropBridge;
use crate::models::descriptor::{DeviceDescriptor, DeviceProfile};
use crate::models::error::CaptureError;
use crate::traits::capture_backend::CaptureBackend;

/// Platform entry points consumed by the device registry and the session
/// factory. One implementation exists per capture platform; it is chosen
/// at build/configuration time, never via runtime reflection.
pub trait CapturePlatform: Send + Sync {
    /// Query the platform for currently attached capture devices.
    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, CaptureError>;

    /// Supported `(size, frame rate)` combinations for one device.
    fn device_profiles(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<Vec<DeviceProfile>, CaptureError>;

    /// Construct a backend bound to `device`.
    fn create_backend(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<Box<dyn CaptureBackend>, CaptureError>;

    /// The graphics interop bridge for hardware-accelerated sessions, if
    /// this platform (or the hosting renderer) provides one. `None` means
    /// hardware sessions cannot be created.
    fn interop_bridge(&self) -> Option<Arc<dyn InteropBridge>> {
        None
    }
}
