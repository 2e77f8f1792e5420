//! Adjustable device parameters (brightness, focus, zoom, ...).
//!
//! A [`Control`] pairs cached range/value metadata with a [`ControlPort`]
//! that round-trips values to the device. Controls the device rejects at
//! probe time are filtered out entirely rather than exposed as disabled.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use crate::models::error::CaptureError;

/// The control surface a capture device can expose: the video-processing
/// amplifier set plus the camera-control set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlId {
    Brightness,
    Contrast,
    Hue,
    Saturation,
    Sharpness,
    Gamma,
    ColorEnable,
    WhiteBalance,
    BacklightCompensation,
    Gain,
    Zoom,
    Focus,
}

impl ControlId {
    pub const ALL: [ControlId; 12] = [
        ControlId::Brightness,
        ControlId::Contrast,
        ControlId::Hue,
        ControlId::Saturation,
        ControlId::Sharpness,
        ControlId::Gamma,
        ControlId::ColorEnable,
        ControlId::WhiteBalance,
        ControlId::BacklightCompensation,
        ControlId::Gain,
        ControlId::Zoom,
        ControlId::Focus,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ControlId::Brightness => "Brightness",
            ControlId::Contrast => "Contrast",
            ControlId::Hue => "Hue",
            ControlId::Saturation => "Saturation",
            ControlId::Sharpness => "Sharpness",
            ControlId::Gamma => "Gamma",
            ControlId::ColorEnable => "Color Enable",
            ControlId::WhiteBalance => "White Balance",
            ControlId::BacklightCompensation => "Backlight Compensation",
            ControlId::Gain => "Gain",
            ControlId::Zoom => "Zoom",
            ControlId::Focus => "Focus",
        }
    }
}

/// Range metadata reported by a control probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRange {
    pub min: i32,
    pub max: i32,
    pub step: i32,
    pub default: i32,
}

impl ControlRange {
    /// Clamp into `[min, max]`, then snap down onto the step grid.
    pub fn constrain(&self, value: i32) -> i32 {
        let clamped = value.clamp(self.min, self.max);
        if self.step > 1 {
            self.min + ((clamped - self.min) / self.step) * self.step
        } else {
            clamped
        }
    }
}

/// Backend round-trip for one device's control values.
///
/// `write` and `read` talk to the hardware synchronously on the caller's
/// thread; neither may be called from the capture callback thread.
pub trait ControlPort: Send + Sync {
    /// Range metadata, or `None` when the device does not expose `id`.
    fn probe(&self, id: ControlId) -> Option<ControlRange>;

    /// Current hardware value.
    fn read(&self, id: ControlId) -> Result<i32, CaptureError>;

    /// Apply a new hardware value.
    fn write(&self, id: ControlId, value: i32) -> Result<(), CaptureError>;
}

/// One adjustable parameter of a capture device.
///
/// Owned by the session that probed it, never shared across sessions.
/// `value()` reads a cached copy and never blocks; `set_value` writes
/// through to the hardware synchronously.
pub struct Control {
    id: ControlId,
    range: ControlRange,
    value: AtomicI32,
    port: Arc<dyn ControlPort>,
}

impl Control {
    /// Probe `id` on `port`. Returns `None` when the device rejects the
    /// control, so unsupported controls never reach callers.
    pub fn probe(port: Arc<dyn ControlPort>, id: ControlId) -> Option<Control> {
        let range = port.probe(id)?;
        let value = port.read(id).unwrap_or(range.default);
        Some(Self {
            id,
            range,
            value: AtomicI32::new(value),
            port,
        })
    }

    /// Probe every known control id, keeping only the supported ones.
    pub fn probe_all(port: Arc<dyn ControlPort>) -> Vec<Control> {
        ControlId::ALL
            .iter()
            .filter_map(|&id| Control::probe(Arc::clone(&port), id))
            .collect()
    }

    pub fn id(&self) -> ControlId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    pub fn min(&self) -> i32 {
        self.range.min
    }

    pub fn max(&self) -> i32 {
        self.range.max
    }

    pub fn step(&self) -> i32 {
        self.range.step
    }

    pub fn default(&self) -> i32 {
        self.range.default
    }

    /// A probed control is supported by construction; present for API
    /// symmetry with platforms that report support separately.
    pub fn is_supported(&self) -> bool {
        true
    }

    /// Cached value; non-blocking.
    pub fn value(&self) -> i32 {
        self.value.load(Ordering::Relaxed)
    }

    /// Write through to the hardware. Out-of-range values are clamped to
    /// `[min, max]` and snapped down to the step grid; the applied value
    /// is returned and becomes the cached value.
    pub fn set_value(&self, value: i32) -> Result<i32, CaptureError> {
        let applied = self.range.constrain(value);
        self.port.write(self.id, applied)?;
        self.value.store(applied, Ordering::Relaxed);
        Ok(applied)
    }

    /// Re-read the hardware value into the cache. Used when the backend
    /// reports an external change to this control.
    pub fn reload(&self) -> Result<i32, CaptureError> {
        let value = self.port.read(self.id)?;
        self.value.store(value, Ordering::Relaxed);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    struct FakePort {
        values: Mutex<HashMap<ControlId, (ControlRange, i32)>>,
    }

    impl FakePort {
        fn with(entries: &[(ControlId, ControlRange, i32)]) -> Arc<Self> {
            let mut values = HashMap::new();
            for &(id, range, value) in entries {
                values.insert(id, (range, value));
            }
            Arc::new(Self {
                values: Mutex::new(values),
            })
        }
    }

    impl ControlPort for FakePort {
        fn probe(&self, id: ControlId) -> Option<ControlRange> {
            self.values.lock().get(&id).map(|(range, _)| *range)
        }

        fn read(&self, id: ControlId) -> Result<i32, CaptureError> {
            self.values
                .lock()
                .get(&id)
                .map(|(_, value)| *value)
                .ok_or_else(|| CaptureError::ControlReadFailed("no such control".into()))
        }

        fn write(&self, id: ControlId, value: i32) -> Result<(), CaptureError> {
            match self.values.lock().get_mut(&id) {
                Some(entry) => {
                    entry.1 = value;
                    Ok(())
                }
                None => Err(CaptureError::ControlWriteFailed("no such control".into())),
            }
        }
    }

    const BRIGHTNESS: ControlRange = ControlRange {
        min: 0,
        max: 100,
        step: 1,
        default: 50,
    };

    #[test]
    fn unsupported_controls_are_filtered_out() {
        let port = FakePort::with(&[(ControlId::Brightness, BRIGHTNESS, 50)]);
        let controls = Control::probe_all(port);

        assert_eq!(controls.len(), 1);
        assert_eq!(controls[0].id(), ControlId::Brightness);
        assert!(controls[0].is_supported());
    }

    #[test]
    fn read_after_write_returns_written_value() {
        let port = FakePort::with(&[(ControlId::Brightness, BRIGHTNESS, 50)]);
        let control = Control::probe(port, ControlId::Brightness).unwrap();

        assert_eq!(control.set_value(73).unwrap(), 73);
        assert_eq!(control.value(), 73);
    }

    #[test]
    fn out_of_range_writes_clamp() {
        let port = FakePort::with(&[(ControlId::Brightness, BRIGHTNESS, 50)]);
        let control = Control::probe(port.clone(), ControlId::Brightness).unwrap();

        assert_eq!(control.set_value(150).unwrap(), 100);
        assert_eq!(control.value(), 100);
        assert_eq!(port.read(ControlId::Brightness).unwrap(), 100);

        assert_eq!(control.set_value(-10).unwrap(), 0);
        assert_eq!(control.value(), 0);
    }

    #[test]
    fn writes_snap_down_to_step_grid() {
        let range = ControlRange {
            min: -5,
            max: 25,
            step: 10,
            default: 5,
        };
        let port = FakePort::with(&[(ControlId::Zoom, range, 5)]);
        let control = Control::probe(port, ControlId::Zoom).unwrap();

        assert_eq!(control.set_value(12).unwrap(), 5); // -5 + 10
        assert_eq!(control.set_value(99).unwrap(), 25);
    }

    #[test]
    fn reload_picks_up_external_change() {
        let port = FakePort::with(&[(ControlId::Focus, BRIGHTNESS, 50)]);
        let control = Control::probe(port.clone(), ControlId::Focus).unwrap();

        port.write(ControlId::Focus, 80).unwrap();
        assert_eq!(control.value(), 50); // cache untouched
        assert_eq!(control.reload().unwrap(), 80);
        assert_eq!(control.value(), 80);
    }

    #[test]
    fn probe_reads_initial_value() {
        let port = FakePort::with(&[(ControlId::Gain, BRIGHTNESS, 42)]);
        let control = Control::probe(port, ControlId::Gain).unwrap();
        assert_eq!(control.value(), 42);
        assert_eq!(control.default(), 50);
    }
}
