//! Synthetic capture platform for tests and headless development.
//!
//! A [`VirtualPlatform`] owns a scriptable set of devices. Each device's
//! [`VirtualDeviceController`] plays the role of the hardware: it emits
//! frames on demand, changes control values behind the session's back,
//! reports transient errors, and can be unplugged mid-session. Frame
//! emission is fully deterministic: nothing is produced unless the
//! controller is told to.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::controls::{Control, ControlId, ControlPort, ControlRange};
use crate::interop::{InteropBridge, SoftwareBridge};
use crate::models::descriptor::{DeviceDescriptor, DeviceProfile};
use crate::models::error::CaptureError;
use crate::models::format::CaptureFormat;
use crate::models::frame::ChannelOrder;
use crate::session::sink::{EventSink, FrameSink};
use crate::traits::capture_backend::{BackendEvent, CaptureBackend};
use crate::traits::capture_platform::CapturePlatform;

/// Session-side wiring held while a backend is initialized against a
/// virtual device.
struct Binding {
    frames: FrameSink,
    events: EventSink,
    format: CaptureFormat,
    producing: bool,
}

struct DeviceInner {
    descriptor: DeviceDescriptor,
    profiles: Mutex<Vec<DeviceProfile>>,
    controls: Mutex<HashMap<ControlId, (ControlRange, i32)>>,
    fail_initialize: AtomicBool,
    binding: Mutex<Option<Binding>>,
    frame_seq: AtomicU64,
}

/// Scripting handle for one virtual device.
#[derive(Clone)]
pub struct VirtualDeviceController {
    inner: Arc<DeviceInner>,
}

impl VirtualDeviceController {
    pub fn descriptor(&self) -> DeviceDescriptor {
        self.inner.descriptor.clone()
    }

    pub fn add_profile(&self, profile: DeviceProfile) {
        self.inner.profiles.lock().push(profile);
    }

    /// Expose a control with the given range and initial value.
    pub fn add_control(&self, id: ControlId, range: ControlRange, initial: i32) {
        self.inner.controls.lock().insert(id, (range, initial));
    }

    /// Change a control value as an outside actor (another application,
    /// the driver) and notify the bound session, if any.
    pub fn change_control_externally(&self, id: ControlId, value: i32) {
        if let Some(entry) = self.inner.controls.lock().get_mut(&id) {
            entry.1 = value;
        }
        if let Some(binding) = self.inner.binding.lock().as_ref() {
            binding.events.raise(BackendEvent::ControlChanged(id));
        }
    }

    /// Make the next backend initialization fail.
    pub fn set_fail_initialize(&self, fail: bool) {
        self.inner.fail_initialize.store(fail, Ordering::SeqCst);
    }

    /// Deliver one synthetic frame the way a capture callback would: a
    /// solid byte pattern advancing per frame. Returns whether the frame
    /// was published (false while stopped, or when the consumer's lease
    /// pinned the write slot).
    pub fn emit_frame(&self) -> bool {
        let mut binding = self.inner.binding.lock();
        let Some(bound) = binding.as_mut() else {
            return false;
        };
        if !bound.producing {
            return false;
        }

        let seq = self.inner.frame_seq.fetch_add(1, Ordering::Relaxed);
        if bound.frames.is_hardware() {
            // The software bridge has no device to copy with; the frame
            // content is the texture itself.
            bound.frames.submit_texture(|_texture| true)
        } else {
            let (width, height) = bound.format.dimensions();
            let row_bytes = width as usize * ChannelOrder::Bgra.bytes_per_pixel();
            let bytes = vec![(seq % 256) as u8; row_bytes * height as usize];
            bound
                .frames
                .submit_pixels(width, height, row_bytes, ChannelOrder::Bgra, &bytes)
        }
    }

    /// Report a transient backend error to the bound session.
    pub fn raise_error(&self, code: i32) {
        if let Some(binding) = self.inner.binding.lock().as_ref() {
            binding.events.raise(BackendEvent::Error(code));
        }
    }

    /// Unplug the device mid-session: production halts and the session is
    /// notified that the device is gone.
    pub fn invalidate(&self) {
        let mut binding = self.inner.binding.lock();
        if let Some(bound) = binding.as_mut() {
            bound.producing = false;
            bound.events.raise(BackendEvent::DeviceInvalidated);
        }
    }

    pub fn is_producing(&self) -> bool {
        self.inner
            .binding
            .lock()
            .as_ref()
            .map(|b| b.producing)
            .unwrap_or(false)
    }
}

struct PlatformInner {
    devices: Mutex<Vec<VirtualDeviceController>>,
    fail_enumeration: AtomicBool,
    bridge: Arc<SoftwareBridge>,
}

/// Synthetic capture platform. Devices are added and removed by whatever
/// drives it; enumeration failures and hot-plug sequences are scripted
/// the same way.
#[derive(Clone)]
pub struct VirtualPlatform {
    inner: Arc<PlatformInner>,
}

impl VirtualPlatform {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PlatformInner {
                devices: Mutex::new(Vec::new()),
                fail_enumeration: AtomicBool::new(false),
                bridge: SoftwareBridge::new(),
            }),
        }
    }

    /// Attach a new virtual device and return its scripting handle.
    pub fn add_device(
        &self,
        name: impl Into<String>,
        id: impl Into<String>,
    ) -> VirtualDeviceController {
        let controller = VirtualDeviceController {
            inner: Arc::new(DeviceInner {
                descriptor: DeviceDescriptor::new(name, id),
                profiles: Mutex::new(vec![DeviceProfile::new(640, 480, 30, 1)]),
                controls: Mutex::new(HashMap::new()),
                fail_initialize: AtomicBool::new(false),
                binding: Mutex::new(None),
                frame_seq: AtomicU64::new(0),
            }),
        };
        self.inner.devices.lock().push(controller.clone());
        controller
    }

    /// Detach a device; returns whether it existed.
    pub fn remove_device(&self, id: &str) -> bool {
        let mut devices = self.inner.devices.lock();
        let before = devices.len();
        devices.retain(|d| d.inner.descriptor.id != id);
        devices.len() != before
    }

    pub fn set_fail_enumeration(&self, fail: bool) {
        self.inner.fail_enumeration.store(fail, Ordering::SeqCst);
    }

    /// The software interop bridge backing hardware-accelerated sessions.
    pub fn software_bridge(&self) -> &Arc<SoftwareBridge> {
        &self.inner.bridge
    }

    fn find(&self, id: &str) -> Option<VirtualDeviceController> {
        self.inner
            .devices
            .lock()
            .iter()
            .find(|d| d.inner.descriptor.id == id)
            .cloned()
    }
}

impl Default for VirtualPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl CapturePlatform for VirtualPlatform {
    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, CaptureError> {
        if self.inner.fail_enumeration.load(Ordering::SeqCst) {
            return Err(CaptureError::EnumerationFailed(
                "virtual platform scripted failure".into(),
            ));
        }
        Ok(self
            .inner
            .devices
            .lock()
            .iter()
            .map(|d| d.inner.descriptor.clone())
            .collect())
    }

    fn device_profiles(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<Vec<DeviceProfile>, CaptureError> {
        self.find(&device.id)
            .map(|d| d.inner.profiles.lock().clone())
            .ok_or(CaptureError::DeviceNotAvailable)
    }

    fn create_backend(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<Box<dyn CaptureBackend>, CaptureError> {
        let controller = self.find(&device.id).ok_or(CaptureError::DeviceNotAvailable)?;
        Ok(Box::new(VirtualBackend {
            device: controller.inner,
        }))
    }

    fn interop_bridge(&self) -> Option<Arc<dyn InteropBridge>> {
        Some(Arc::clone(&self.inner.bridge) as Arc<dyn InteropBridge>)
    }
}

struct VirtualControlPort {
    device: Arc<DeviceInner>,
}

impl ControlPort for VirtualControlPort {
    fn probe(&self, id: ControlId) -> Option<ControlRange> {
        self.device.controls.lock().get(&id).map(|(range, _)| *range)
    }

    fn read(&self, id: ControlId) -> Result<i32, CaptureError> {
        self.device
            .controls
            .lock()
            .get(&id)
            .map(|(_, value)| *value)
            .ok_or_else(|| CaptureError::ControlReadFailed("control not exposed".into()))
    }

    fn write(&self, id: ControlId, value: i32) -> Result<(), CaptureError> {
        match self.device.controls.lock().get_mut(&id) {
            Some(entry) => {
                entry.1 = value;
                Ok(())
            }
            None => Err(CaptureError::ControlWriteFailed("control not exposed".into())),
        }
    }
}

/// Backend bound to one virtual device.
pub struct VirtualBackend {
    device: Arc<DeviceInner>,
}

impl Drop for VirtualBackend {
    fn drop(&mut self) {
        // Releasing the backend releases the device: the session's frame
        // writer lives in the binding and must not outlive the session.
        *self.device.binding.lock() = None;
    }
}

impl CaptureBackend for VirtualBackend {
    fn initialize(
        &mut self,
        _device: &DeviceDescriptor,
        format: &CaptureFormat,
        frames: FrameSink,
        events: EventSink,
    ) -> Result<(), CaptureError> {
        if self.device.fail_initialize.load(Ordering::SeqCst) {
            return Err(CaptureError::InitializationFailed(
                "virtual device scripted failure".into(),
            ));
        }
        *self.device.binding.lock() = Some(Binding {
            frames,
            events: events.clone(),
            format: format.clone(),
            producing: false,
        });
        events.raise(BackendEvent::Initialized);
        Ok(())
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        let mut binding = self.device.binding.lock();
        match binding.as_mut() {
            Some(bound) => {
                bound.producing = true;
                bound.events.raise(BackendEvent::Started);
                Ok(())
            }
            None => Err(CaptureError::InitializationFailed(
                "backend not initialized".into(),
            )),
        }
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        let mut binding = self.device.binding.lock();
        match binding.as_mut() {
            Some(bound) => {
                bound.producing = false;
                bound.events.raise(BackendEvent::Stopped);
                Ok(())
            }
            None => Err(CaptureError::InitializationFailed(
                "backend not initialized".into(),
            )),
        }
    }

    fn probe_controls(&mut self) -> Vec<Control> {
        Control::probe_all(Arc::new(VirtualControlPort {
            device: Arc::clone(&self.device),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumeration_lists_added_devices() {
        let platform = VirtualPlatform::new();
        platform.add_device("Cam A", "a");
        platform.add_device("Cam B", "b");

        let devices = platform.enumerate_devices().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].id, "a");

        assert!(platform.remove_device("a"));
        assert!(!platform.remove_device("a"));
        assert_eq!(platform.enumerate_devices().unwrap().len(), 1);
    }

    #[test]
    fn scripted_enumeration_failure() {
        let platform = VirtualPlatform::new();
        platform.add_device("Cam", "a");
        platform.set_fail_enumeration(true);
        assert!(platform.enumerate_devices().is_err());
    }

    #[test]
    fn emit_frame_requires_a_started_backend() {
        let platform = VirtualPlatform::new();
        let controller = platform.add_device("Cam", "a");

        // No binding at all.
        assert!(!controller.emit_frame());

        let mut backend = platform.create_backend(&controller.descriptor()).unwrap();
        let events = EventSink::new();
        let (writer, _reader) =
            crate::processing::double_buffer::double_buffer([Default::default(), Default::default()]);
        let diagnostics = Arc::new(crate::session::sink::DiagnosticsCounters::default());
        let frames = FrameSink::for_surfaces(writer, diagnostics);
        backend
            .initialize(
                &controller.descriptor(),
                &CaptureFormat::new().size(4, 4),
                frames,
                events.clone(),
            )
            .unwrap();

        // Initialized but not started.
        assert!(!controller.emit_frame());

        backend.start().unwrap();
        assert!(controller.is_producing());
        assert!(controller.emit_frame());

        backend.stop().unwrap();
        assert!(!controller.emit_frame());
    }

    #[test]
    fn backend_for_unknown_device_is_refused() {
        let platform = VirtualPlatform::new();
        platform.add_device("Cam", "a");
        let ghost = DeviceDescriptor::new("Ghost", "nope");
        assert!(platform.create_backend(&ghost).is_err());
    }
}
