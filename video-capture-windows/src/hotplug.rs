//! Device arrival/removal notifications.
//!
//! Registers a configuration-manager notification for the capture device
//! interface class and forwards arrival/removal to the core registry's
//! hot-plug diff, which turns a raw notification into per-device
//! added/removed events.

use windows::Win32::Devices::DeviceAndDriverInstallation::*;
use windows::Win32::Foundation::ERROR_SUCCESS;
use windows::Win32::Media::KernelStreaming::KSCATEGORY_CAPTURE;

use video_capture_core::devices::registry::DeviceRegistry;
use video_capture_core::models::error::CaptureError;

/// Watches capture device interface arrival/removal for the lifetime of
/// the value; each notification runs the registry's snapshot diff.
pub struct HotplugWatcher {
    handle: HCMNOTIFICATION,
}

// SAFETY: the notification handle is only registered/unregistered from
// the owning thread; the callback carries no state beyond the global
// registry.
unsafe impl Send for HotplugWatcher {}

impl HotplugWatcher {
    /// Register for capture-class interface notifications. The global
    /// `DeviceRegistry` must be installed first; its diff runs on the
    /// notification callback's thread.
    pub fn register() -> Result<Self, CaptureError> {
        let mut filter = unsafe { std::mem::zeroed::<CM_NOTIFY_FILTER>() };
        filter.cbSize = std::mem::size_of::<CM_NOTIFY_FILTER>() as u32;
        filter.FilterType = CM_NOTIFY_FILTER_TYPE_DEVICEINTERFACE;
        filter.u.DeviceInterface.ClassGuid = KSCATEGORY_CAPTURE;

        let mut handle = HCMNOTIFICATION::default();
        let result = unsafe {
            CM_Register_Notification(
                &filter,
                Some(std::ptr::null()),
                Some(on_device_notify),
                &mut handle,
            )
        };
        if result != CR_SUCCESS {
            return Err(CaptureError::Unknown(format!(
                "CM_Register_Notification failed: {result:?}"
            )));
        }
        Ok(Self { handle })
    }
}

impl Drop for HotplugWatcher {
    fn drop(&mut self) {
        unsafe {
            let _ = CM_Unregister_Notification(self.handle);
        }
    }
}

unsafe extern "system" fn on_device_notify(
    _notify: HCMNOTIFICATION,
    _context: *const core::ffi::c_void,
    action: CM_NOTIFY_ACTION,
    _event_data: *const CM_NOTIFY_EVENT_DATA,
    _event_data_size: u32,
) -> u32 {
    if action == CM_NOTIFY_ACTION_DEVICEINTERFACEARRIVAL
        || action == CM_NOTIFY_ACTION_DEVICEINTERFACEREMOVAL
    {
        if let Some(registry) = DeviceRegistry::global() {
            registry.handle_hotplug();
        }
    }
    ERROR_SUCCESS.0
}
