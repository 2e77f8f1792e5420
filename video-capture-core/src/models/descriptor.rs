use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a capture device as reported by the platform.
///
/// Equality covers both fields. Ordering is lexicographic by `(id, name)`;
/// the id is the stable half of the identity (a symbolic link or bus path),
/// the name is what users see and may repeat across identical devices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub name: String,
    pub id: String,
}

impl DeviceDescriptor {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

impl Ord for DeviceDescriptor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id).then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for DeviceDescriptor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// A supported `(size, frame rate)` combination advertised by a device.
///
/// Used to populate format-negotiation choices; `key()` is the stable
/// string identity used for equality and selection in UI lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub width: u32,
    pub height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
}

impl DeviceProfile {
    pub fn new(width: u32, height: u32, fps_num: u32, fps_den: u32) -> Self {
        Self {
            width,
            height,
            fps_num,
            fps_den,
        }
    }

    /// Stable string key, e.g. `"1920x1080@30/1"`.
    pub fn key(&self) -> String {
        format!(
            "{}x{}@{}/{}",
            self.width, self.height, self.fps_num, self.fps_den
        )
    }

    /// Frame rate as a float, for display purposes.
    pub fn frames_per_second(&self) -> f64 {
        if self.fps_den == 0 {
            return 0.0;
        }
        self.fps_num as f64 / self.fps_den as f64
    }
}

impl fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_covers_both_fields() {
        let a = DeviceDescriptor::new("Webcam", "usb-1");
        let b = DeviceDescriptor::new("Webcam", "usb-2");
        let c = DeviceDescriptor::new("Webcam", "usb-1");

        assert_ne!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn ordering_is_total_by_id_then_name() {
        let mut devices = vec![
            DeviceDescriptor::new("Z Cam", "usb-1"),
            DeviceDescriptor::new("A Cam", "usb-2"),
            DeviceDescriptor::new("A Cam", "usb-1"),
        ];
        devices.sort();

        assert_eq!(devices[0].name, "A Cam");
        assert_eq!(devices[0].id, "usb-1");
        assert_eq!(devices[1].name, "Z Cam");
        assert_eq!(devices[2].id, "usb-2");
    }

    #[test]
    fn profile_key_is_stable() {
        let p = DeviceProfile::new(1920, 1080, 30, 1);
        assert_eq!(p.key(), "1920x1080@30/1");
        assert_eq!(p.to_string(), p.key());
    }

    #[test]
    fn profile_fps_handles_zero_denominator() {
        assert_eq!(DeviceProfile::new(640, 480, 30, 0).frames_per_second(), 0.0);
        let ntsc = DeviceProfile::new(640, 480, 30000, 1001);
        assert!((ntsc.frames_per_second() - 29.97).abs() < 0.01);
    }

    #[test]
    fn descriptor_serializes_to_json() {
        let d = DeviceDescriptor::new("Webcam", "usb-1");
        let json = serde_json::to_string(&d).unwrap();
        let back: DeviceDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }
}
