//! Device enumeration cache and hot-plug diffing.

use std::sync::Arc;
use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::models::descriptor::{DeviceDescriptor, DeviceProfile};
use crate::models::error::CaptureError;
use crate::signal::Signal;
use crate::traits::capture_platform::CapturePlatform;

static GLOBAL: OnceLock<DeviceRegistry> = OnceLock::new();

/// Cached view of the platform's capture devices with hot-plug
/// notifications.
///
/// The cache is lazily populated on the first query and replaced on
/// refresh. A platform hot-plug notification is turned into add/remove
/// events by diffing the previous snapshot against a fresh enumeration,
/// by descriptor value equality. If enumeration fails the cache is left
/// unchanged and no events fire.
pub struct DeviceRegistry {
    platform: Arc<dyn CapturePlatform>,
    cache: Mutex<Option<Vec<DeviceDescriptor>>>,
    /// Fired once per descriptor that appears in a refreshed enumeration.
    pub on_device_added: Signal<DeviceDescriptor>,
    /// Fired once per descriptor that disappears from a refreshed
    /// enumeration.
    pub on_device_removed: Signal<DeviceDescriptor>,
}

impl DeviceRegistry {
    pub fn new(platform: Arc<dyn CapturePlatform>) -> Self {
        Self {
            platform,
            cache: Mutex::new(None),
            on_device_added: Signal::new(),
            on_device_removed: Signal::new(),
        }
    }

    /// Install the process-wide registry. The first caller wins; repeat
    /// calls return the existing instance regardless of `platform`.
    pub fn install_global(platform: Arc<dyn CapturePlatform>) -> &'static DeviceRegistry {
        GLOBAL.get_or_init(|| DeviceRegistry::new(platform))
    }

    /// The process-wide registry, if one has been installed.
    pub fn global() -> Option<&'static DeviceRegistry> {
        GLOBAL.get()
    }

    /// Cached device snapshot. `refresh` forces a platform re-query; an
    /// empty cache is populated on first call either way. On enumeration
    /// failure the previous cache is kept (stale but safe) and the stale
    /// snapshot is returned.
    pub fn devices(&self, refresh: bool) -> Vec<DeviceDescriptor> {
        let mut cache = self.cache.lock();
        if cache.is_none() || refresh {
            match self.platform.enumerate_devices() {
                Ok(list) => *cache = Some(list),
                Err(e) => {
                    log::warn!("device enumeration failed, keeping cached list: {e}");
                }
            }
        }
        cache.clone().unwrap_or_default()
    }

    /// Supported profiles for one device, straight from the platform.
    pub fn profiles(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<Vec<DeviceProfile>, CaptureError> {
        self.platform.device_profiles(device)
    }

    /// Re-enumerate and emit removed/added events for the delta. Platform
    /// hot-plug watchers call this on device arrival/removal.
    ///
    /// Removals are emitted before additions; a descriptor present in
    /// both snapshots produces neither.
    pub fn handle_hotplug(&self) {
        let previous = self.devices(false);
        let current = match self.platform.enumerate_devices() {
            Ok(list) => list,
            Err(e) => {
                log::warn!("hot-plug enumeration failed, keeping cached list: {e}");
                return;
            }
        };
        *self.cache.lock() = Some(current.clone());

        for gone in previous.iter().filter(|p| !current.contains(p)) {
            self.on_device_removed.emit(gone);
        }
        for added in current.iter().filter(|c| !previous.contains(c)) {
            self.on_device_added.emit(added);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::slot;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Platform stub with a scripted device list.
    struct ScriptedPlatform {
        devices: Mutex<Vec<DeviceDescriptor>>,
        fail: AtomicBool,
        enumerations: std::sync::atomic::AtomicUsize,
    }

    impl ScriptedPlatform {
        fn with(names: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                devices: Mutex::new(
                    names
                        .iter()
                        .map(|(n, i)| DeviceDescriptor::new(*n, *i))
                        .collect(),
                ),
                fail: AtomicBool::new(false),
                enumerations: std::sync::atomic::AtomicUsize::new(0),
            })
        }

        fn set_devices(&self, names: &[(&str, &str)]) {
            *self.devices.lock() = names
                .iter()
                .map(|(n, i)| DeviceDescriptor::new(*n, *i))
                .collect();
        }
    }

    impl CapturePlatform for ScriptedPlatform {
        fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, CaptureError> {
            self.enumerations.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(CaptureError::EnumerationFailed("scripted failure".into()));
            }
            Ok(self.devices.lock().clone())
        }

        fn device_profiles(
            &self,
            _device: &DeviceDescriptor,
        ) -> Result<Vec<DeviceProfile>, CaptureError> {
            Ok(vec![DeviceProfile::new(640, 480, 30, 1)])
        }

        fn create_backend(
            &self,
            _device: &DeviceDescriptor,
        ) -> Result<Box<dyn crate::traits::capture_backend::CaptureBackend>, CaptureError> {
            Err(CaptureError::DeviceNotAvailable)
        }
    }

    #[test]
    fn first_query_populates_the_cache() {
        let platform = ScriptedPlatform::with(&[("A", "a")]);
        let registry = DeviceRegistry::new(platform.clone());

        assert_eq!(registry.devices(false).len(), 1);
        // Second non-refresh query answers from cache.
        registry.devices(false);
        assert_eq!(platform.enumerations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn refresh_replaces_the_cache() {
        let platform = ScriptedPlatform::with(&[("A", "a")]);
        let registry = DeviceRegistry::new(platform.clone());
        registry.devices(false);

        platform.set_devices(&[("B", "b")]);
        assert_eq!(registry.devices(false)[0].id, "a"); // cached
        assert_eq!(registry.devices(true)[0].id, "b"); // refreshed
    }

    #[test]
    fn hotplug_diff_emits_removed_then_added() {
        let platform = ScriptedPlatform::with(&[("A", "a"), ("B", "b")]);
        let registry = DeviceRegistry::new(platform.clone());
        registry.devices(false);

        let events = Arc::new(Mutex::new(Vec::new()));
        let e1 = Arc::clone(&events);
        let removed = slot(move |d: &DeviceDescriptor| e1.lock().push(format!("removed {}", d.id)));
        let e2 = Arc::clone(&events);
        let added = slot(move |d: &DeviceDescriptor| e2.lock().push(format!("added {}", d.id)));
        registry.on_device_removed.connect(&removed);
        registry.on_device_added.connect(&added);

        platform.set_devices(&[("B", "b"), ("C", "c")]);
        registry.handle_hotplug();

        // Exactly one removal and one addition, removal first; "b" is in
        // both snapshots and produces neither.
        assert_eq!(*events.lock(), vec!["removed a", "added c"]);
        assert_eq!(registry.devices(false).len(), 2);
    }

    #[test]
    fn failed_enumeration_keeps_cache_and_emits_nothing() {
        let platform = ScriptedPlatform::with(&[("A", "a")]);
        let registry = DeviceRegistry::new(platform.clone());
        registry.devices(false);

        let fired = Arc::new(AtomicBool::new(false));
        let f1 = Arc::clone(&fired);
        let removed = slot(move |_: &DeviceDescriptor| f1.store(true, Ordering::SeqCst));
        let f2 = Arc::clone(&fired);
        let added = slot(move |_: &DeviceDescriptor| f2.store(true, Ordering::SeqCst));
        registry.on_device_removed.connect(&removed);
        registry.on_device_added.connect(&added);

        platform.fail.store(true, Ordering::SeqCst);
        registry.handle_hotplug();
        let stale = registry.devices(true);

        assert!(!fired.load(Ordering::SeqCst));
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, "a");
    }
}
