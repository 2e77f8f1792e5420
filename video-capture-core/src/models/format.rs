use serde::{Deserialize, Serialize};

use super::descriptor::{DeviceDescriptor, DeviceProfile};

/// Rotation applied to delivered frames, in 90° steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 90,
            Rotation::R180 => 180,
            Rotation::R270 => 270,
        }
    }
}

/// Per-session capture configuration.
///
/// Built once with the fluent methods below and frozen when a
/// `CaptureSession` is constructed from it. Defaults: 640×480 at 30/1 fps,
/// hardware acceleration on, no rotation, auto-start on, no explicit
/// device (the first enumerated device is used).
#[derive(Debug, Clone)]
pub struct CaptureFormat {
    width: u32,
    height: u32,
    fps_num: u32,
    fps_den: u32,
    device: Option<DeviceDescriptor>,
    hardware_accelerated: bool,
    rotation: Rotation,
    auto_start: bool,
    profile: Option<DeviceProfile>,
}

impl Default for CaptureFormat {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps_num: 30,
            fps_den: 1,
            device: None,
            hardware_accelerated: true,
            rotation: Rotation::R0,
            auto_start: true,
            profile: None,
        }
    }
}

impl CaptureFormat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Whole frames per second (denominator 1).
    pub fn fps(self, fps: u32) -> Self {
        self.fps_rational(fps, 1)
    }

    /// Frame rate as a rational, e.g. `30000/1001` for NTSC rates.
    pub fn fps_rational(mut self, num: u32, den: u32) -> Self {
        self.fps_num = num;
        self.fps_den = den.max(1);
        self
    }

    pub fn device(mut self, device: DeviceDescriptor) -> Self {
        self.device = Some(device);
        self
    }

    pub fn hardware_accelerated(mut self, accelerated: bool) -> Self {
        self.hardware_accelerated = accelerated;
        self
    }

    pub fn rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Adopt a negotiated device profile; size and frame rate follow it.
    pub fn profile(mut self, profile: DeviceProfile) -> Self {
        self.width = profile.width;
        self.height = profile.height;
        self.fps_num = profile.fps_num;
        self.fps_den = profile.fps_den;
        self.profile = Some(profile);
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn fps_num(&self) -> u32 {
        self.fps_num
    }

    pub fn fps_den(&self) -> u32 {
        self.fps_den
    }

    pub fn frames_per_second(&self) -> f64 {
        self.fps_num as f64 / self.fps_den as f64
    }

    pub fn target_device(&self) -> Option<&DeviceDescriptor> {
        self.device.as_ref()
    }

    pub fn is_hardware_accelerated(&self) -> bool {
        self.hardware_accelerated
    }

    pub fn rotation_angle(&self) -> Rotation {
        self.rotation
    }

    pub fn is_auto_start(&self) -> bool {
        self.auto_start
    }

    pub fn negotiated_profile(&self) -> Option<&DeviceProfile> {
        self.profile.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let fmt = CaptureFormat::default();
        assert_eq!(fmt.dimensions(), (640, 480));
        assert_eq!((fmt.fps_num(), fmt.fps_den()), (30, 1));
        assert!(fmt.is_hardware_accelerated());
        assert!(fmt.is_auto_start());
        assert_eq!(fmt.rotation_angle(), Rotation::R0);
        assert!(fmt.target_device().is_none());
    }

    #[test]
    fn builder_chains() {
        let device = DeviceDescriptor::new("Cam", "id-1");
        let fmt = CaptureFormat::new()
            .size(1280, 720)
            .fps_rational(30000, 1001)
            .device(device.clone())
            .hardware_accelerated(false)
            .rotation(Rotation::R180)
            .auto_start(false);

        assert_eq!(fmt.dimensions(), (1280, 720));
        assert_eq!((fmt.fps_num(), fmt.fps_den()), (30000, 1001));
        assert_eq!(fmt.target_device(), Some(&device));
        assert!(!fmt.is_hardware_accelerated());
        assert_eq!(fmt.rotation_angle().degrees(), 180);
        assert!(!fmt.is_auto_start());
    }

    #[test]
    fn profile_overrides_size_and_rate() {
        let profile = DeviceProfile::new(1920, 1080, 60, 1);
        let fmt = CaptureFormat::new().size(640, 480).profile(profile);

        assert_eq!(fmt.dimensions(), (1920, 1080));
        assert_eq!(fmt.fps_num(), 60);
        assert_eq!(fmt.negotiated_profile(), Some(&profile));
    }

    #[test]
    fn zero_fps_denominator_is_pinned_to_one() {
        let fmt = CaptureFormat::new().fps_rational(30, 0);
        assert_eq!(fmt.fps_den(), 1);
    }
}
