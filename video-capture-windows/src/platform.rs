//! `CapturePlatform` over the Media Foundation stack.

use std::sync::Arc;

use video_capture_core::models::descriptor::{DeviceDescriptor, DeviceProfile};
use video_capture_core::models::error::CaptureError;
use video_capture_core::traits::capture_backend::CaptureBackend;
use video_capture_core::traits::capture_platform::CapturePlatform;
use video_capture_core::InteropBridge;

use crate::device_enumerator::DeviceEnumerator;
use crate::source_reader::MediaFoundationBackend;

/// The Windows capture platform: MF enumeration plus source-reader
/// backends.
///
/// Hardware-accelerated sessions need a graphics interop bridge from the
/// hosting renderer; install one with [`with_interop_bridge`] or sessions
/// fall back to refusing hardware formats.
///
/// [`with_interop_bridge`]: MediaFoundationPlatform::with_interop_bridge
#[derive(Default)]
pub struct MediaFoundationPlatform {
    bridge: Option<Arc<dyn InteropBridge>>,
}

impl MediaFoundationPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the hosting renderer's interop bridge, enabling
    /// hardware-accelerated sessions.
    pub fn with_interop_bridge(bridge: Arc<dyn InteropBridge>) -> Self {
        Self {
            bridge: Some(bridge),
        }
    }
}

impl CapturePlatform for MediaFoundationPlatform {
    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, CaptureError> {
        DeviceEnumerator::list_devices()
    }

    fn device_profiles(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<Vec<DeviceProfile>, CaptureError> {
        DeviceEnumerator::list_profiles(device)
    }

    fn create_backend(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<Box<dyn CaptureBackend>, CaptureError> {
        Ok(Box::new(MediaFoundationBackend::new(device.clone())?))
    }

    fn interop_bridge(&self) -> Option<Arc<dyn InteropBridge>> {
        self.bridge.clone()
    }
}
