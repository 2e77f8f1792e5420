//! Camera controls via kernel-streaming properties.
//!
//! Video capture sources expose their adjustable parameters through
//! `IKsControl`: the video-processing amplifier property set (brightness,
//! contrast, ...) and the camera-control set (zoom, focus). The probe
//! issues a basic-support query per control; devices that reject it are
//! filtered out by the core.

use windows::core::GUID;
use windows::Win32::Media::KernelStreaming::*;

use video_capture_core::controls::{ControlId, ControlPort, ControlRange};
use video_capture_core::models::error::CaptureError;

/// Property-set GUID and id for each core control.
fn property_key(id: ControlId) -> (GUID, u32) {
    match id {
        ControlId::Brightness => (
            PROPSETID_VIDCAP_VIDEOPROCAMP,
            KSPROPERTY_VIDEOPROCAMP_BRIGHTNESS.0 as u32,
        ),
        ControlId::Contrast => (
            PROPSETID_VIDCAP_VIDEOPROCAMP,
            KSPROPERTY_VIDEOPROCAMP_CONTRAST.0 as u32,
        ),
        ControlId::Hue => (
            PROPSETID_VIDCAP_VIDEOPROCAMP,
            KSPROPERTY_VIDEOPROCAMP_HUE.0 as u32,
        ),
        ControlId::Saturation => (
            PROPSETID_VIDCAP_VIDEOPROCAMP,
            KSPROPERTY_VIDEOPROCAMP_SATURATION.0 as u32,
        ),
        ControlId::Sharpness => (
            PROPSETID_VIDCAP_VIDEOPROCAMP,
            KSPROPERTY_VIDEOPROCAMP_SHARPNESS.0 as u32,
        ),
        ControlId::Gamma => (
            PROPSETID_VIDCAP_VIDEOPROCAMP,
            KSPROPERTY_VIDEOPROCAMP_GAMMA.0 as u32,
        ),
        ControlId::ColorEnable => (
            PROPSETID_VIDCAP_VIDEOPROCAMP,
            KSPROPERTY_VIDEOPROCAMP_COLORENABLE.0 as u32,
        ),
        ControlId::WhiteBalance => (
            PROPSETID_VIDCAP_VIDEOPROCAMP,
            KSPROPERTY_VIDEOPROCAMP_WHITEBALANCE.0 as u32,
        ),
        ControlId::BacklightCompensation => (
            PROPSETID_VIDCAP_VIDEOPROCAMP,
            KSPROPERTY_VIDEOPROCAMP_BACKLIGHT_COMPENSATION.0 as u32,
        ),
        ControlId::Gain => (
            PROPSETID_VIDCAP_VIDEOPROCAMP,
            KSPROPERTY_VIDEOPROCAMP_GAIN.0 as u32,
        ),
        ControlId::Zoom => (
            PROPSETID_VIDCAP_CAMERACONTROL,
            KSPROPERTY_CAMERACONTROL_ZOOM.0 as u32,
        ),
        ControlId::Focus => (
            PROPSETID_VIDCAP_CAMERACONTROL,
            KSPROPERTY_CAMERACONTROL_FOCUS.0 as u32,
        ),
    }
}

// Flat `#[repr(C)]` mirrors of the kernel-streaming property blocks.
// Matching the C layout directly keeps the round trips independent of the
// generated union shapes.

#[repr(C)]
#[derive(Clone, Copy)]
struct KsIdentifier {
    set: GUID,
    id: u32,
    flags: u32,
}

/// `KSPROPERTY_VIDEOPROCAMP_S` / `KSPROPERTY_CAMERACONTROL_S` get/set
/// round-trip block.
#[repr(C)]
struct KsPropertyValue {
    property: KsIdentifier,
    value: i32,
    flags: u32,
    capabilities: u32,
}

#[repr(C)]
struct KsPropertyDescription {
    access_flags: u32,
    description_size: u32,
    prop_type_set: KsIdentifier,
    members_list_count: u32,
    reserved: u32,
}

#[repr(C)]
struct KsMembersHeader {
    members_flags: u32,
    members_size: u32,
    members_count: u32,
    flags: u32,
}

/// `KSPROPERTY_STEPPING_LONG` with the signed arm of the bounds union.
#[repr(C)]
struct KsSteppingLong {
    stepping_delta: u32,
    reserved: u32,
    signed_minimum: i32,
    signed_maximum: i32,
}

/// Basic-support reply: description + members header + stepping range.
#[repr(C)]
struct KsMemberList {
    desc: KsPropertyDescription,
    header: KsMembersHeader,
    step: KsSteppingLong,
}

/// Default-values reply: description + members header + one long.
#[repr(C)]
struct KsDefaultValue {
    desc: KsPropertyDescription,
    header: KsMembersHeader,
    value: i32,
}

/// `ControlPort` over a capture source's `IKsControl` interface.
pub struct KsControlPort {
    control: IKsControl,
}

// SAFETY: the session serializes all control round trips on the consumer
// thread; the interface pointer itself is freely movable.
unsafe impl Send for KsControlPort {}
unsafe impl Sync for KsControlPort {}

impl KsControlPort {
    pub fn new(control: IKsControl) -> Self {
        Self { control }
    }

    unsafe fn ks_query<T>(&self, property: &KsIdentifier, reply: &mut T) -> bool {
        let mut returned = 0u32;
        self.control
            .KsProperty(
                property as *const KsIdentifier as *const KSPROPERTY,
                std::mem::size_of::<KsIdentifier>() as u32,
                reply as *mut T as *mut core::ffi::c_void,
                std::mem::size_of::<T>() as u32,
                &mut returned,
            )
            .is_ok()
    }

    fn ks_round_trip(&self, id: ControlId, flags: u32, value: i32) -> Result<i32, String> {
        let (set, key) = property_key(id);
        let mut block = KsPropertyValue {
            property: KsIdentifier {
                set,
                id: key,
                flags,
            },
            value,
            flags: 0,
            capabilities: 0,
        };
        let mut returned = 0u32;
        unsafe {
            self.control
                .KsProperty(
                    &block.property as *const KsIdentifier as *const KSPROPERTY,
                    std::mem::size_of::<KsPropertyValue>() as u32,
                    &mut block as *mut KsPropertyValue as *mut core::ffi::c_void,
                    std::mem::size_of::<KsPropertyValue>() as u32,
                    &mut returned,
                )
                .map_err(|e| e.to_string())?;
        }
        Ok(block.value)
    }
}

impl ControlPort for KsControlPort {
    fn probe(&self, id: ControlId) -> Option<ControlRange> {
        let (set, key) = property_key(id);

        let support = KsIdentifier {
            set,
            id: key,
            flags: KSPROPERTY_TYPE_BASICSUPPORT,
        };
        let mut members = unsafe { std::mem::zeroed::<KsMemberList>() };
        if !unsafe { self.ks_query(&support, &mut members) } {
            return None;
        }

        let defaults = KsIdentifier {
            set,
            id: key,
            flags: KSPROPERTY_TYPE_DEFAULTVALUES,
        };
        let mut default = unsafe { std::mem::zeroed::<KsDefaultValue>() };
        if !unsafe { self.ks_query(&defaults, &mut default) } {
            return None;
        }

        Some(ControlRange {
            min: members.step.signed_minimum,
            max: members.step.signed_maximum,
            step: members.step.stepping_delta as i32,
            default: default.value,
        })
    }

    fn read(&self, id: ControlId) -> Result<i32, CaptureError> {
        self.ks_round_trip(id, KSPROPERTY_TYPE_GET, -1)
            .map_err(CaptureError::ControlReadFailed)
    }

    fn write(&self, id: ControlId, value: i32) -> Result<(), CaptureError> {
        self.ks_round_trip(id, KSPROPERTY_TYPE_SET, value)
            .map(|_| ())
            .map_err(CaptureError::ControlWriteFailed)
    }
}
