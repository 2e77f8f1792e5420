//! Video capture device enumeration via Media Foundation.
//!
//! Wraps `MFEnumDeviceSources` to list capture devices with friendly
//! names and symbolic-link ids, and reads each device's supported
//! `(size, frame rate)` profiles from its presentation descriptor.

use windows::core::*;
use windows::Win32::Media::MediaFoundation::*;

use video_capture_core::models::descriptor::{DeviceDescriptor, DeviceProfile};
use video_capture_core::models::error::CaptureError;

/// Video device enumerator over the Media Foundation activation store.
pub struct DeviceEnumerator;

impl DeviceEnumerator {
    /// List attached video capture devices.
    ///
    /// The descriptor name is `MF_DEVSOURCE_ATTRIBUTE_FRIENDLY_NAME`; the
    /// id is the device's symbolic link, which stays stable across
    /// re-enumerations of the same physical device.
    pub fn list_devices() -> Result<Vec<DeviceDescriptor>, CaptureError> {
        unsafe {
            let attributes = Self::vidcap_attributes()?;

            let mut activates: *mut Option<IMFActivate> = std::ptr::null_mut();
            let mut count: u32 = 0;
            MFEnumDeviceSources(&attributes, &mut activates, &mut count).map_err(|e| {
                CaptureError::EnumerationFailed(format!("MFEnumDeviceSources failed: {e}"))
            })?;

            let slice = std::slice::from_raw_parts(activates, count as usize);
            let mut devices = Vec::with_capacity(count as usize);
            for activate in slice.iter().flatten() {
                let name = Self::allocated_string(activate, &MF_DEVSOURCE_ATTRIBUTE_FRIENDLY_NAME)
                    .unwrap_or_else(|| "<Unknown Device>".into());
                let Some(id) = Self::allocated_string(
                    activate,
                    &MF_DEVSOURCE_ATTRIBUTE_SOURCE_TYPE_VIDCAP_SYMBOLIC_LINK,
                ) else {
                    continue;
                };
                devices.push(DeviceDescriptor::new(name, id));
            }
            windows::Win32::System::Com::CoTaskMemFree(Some(activates as *const _));

            Ok(devices)
        }
    }

    /// Activate the media source matching `descriptor` by symbolic link.
    pub fn find_source(descriptor: &DeviceDescriptor) -> Result<IMFMediaSource, CaptureError> {
        unsafe {
            let attributes = Self::vidcap_attributes()?;

            let mut activates: *mut Option<IMFActivate> = std::ptr::null_mut();
            let mut count: u32 = 0;
            MFEnumDeviceSources(&attributes, &mut activates, &mut count).map_err(|e| {
                CaptureError::EnumerationFailed(format!("MFEnumDeviceSources failed: {e}"))
            })?;

            let slice = std::slice::from_raw_parts(activates, count as usize);
            let mut source = None;
            for activate in slice.iter().flatten() {
                let id = Self::allocated_string(
                    activate,
                    &MF_DEVSOURCE_ATTRIBUTE_SOURCE_TYPE_VIDCAP_SYMBOLIC_LINK,
                );
                if id.as_deref() == Some(descriptor.id.as_str()) {
                    source = activate.ActivateObject::<IMFMediaSource>().ok();
                    break;
                }
            }
            windows::Win32::System::Com::CoTaskMemFree(Some(activates as *const _));

            source.ok_or(CaptureError::DeviceNotAvailable)
        }
    }

    /// Supported `(size, frame rate)` profiles for one device, read from
    /// the first video stream's media type handler.
    pub fn list_profiles(
        descriptor: &DeviceDescriptor,
    ) -> Result<Vec<DeviceProfile>, CaptureError> {
        unsafe {
            let source = Self::find_source(descriptor)?;
            let presentation = source.CreatePresentationDescriptor().map_err(|e| {
                CaptureError::EnumerationFailed(format!(
                    "CreatePresentationDescriptor failed: {e}"
                ))
            })?;

            let mut selected = windows::Win32::Foundation::BOOL::default();
            let mut stream = None;
            presentation
                .GetStreamDescriptorByIndex(0, &mut selected, &mut stream)
                .map_err(|e| {
                    CaptureError::EnumerationFailed(format!("stream descriptor failed: {e}"))
                })?;
            let stream = stream.ok_or_else(|| {
                CaptureError::EnumerationFailed("no stream descriptor".into())
            })?;

            let handler = stream.GetMediaTypeHandler().map_err(|e| {
                CaptureError::EnumerationFailed(format!("GetMediaTypeHandler failed: {e}"))
            })?;
            let count = handler.GetMediaTypeCount().map_err(|e| {
                CaptureError::EnumerationFailed(format!("GetMediaTypeCount failed: {e}"))
            })?;

            let mut profiles = Vec::new();
            for index in 0..count {
                let Ok(media_type) = handler.GetMediaTypeByIndex(index) else {
                    continue;
                };
                // MF packs size and rate into 64-bit attributes:
                // high 32 bits = width/numerator, low 32 = height/denominator.
                let Ok(size) = media_type.GetUINT64(&MF_MT_FRAME_SIZE) else {
                    continue;
                };
                let Ok(rate) = media_type.GetUINT64(&MF_MT_FRAME_RATE) else {
                    continue;
                };
                let profile = DeviceProfile::new(
                    (size >> 32) as u32,
                    size as u32,
                    (rate >> 32) as u32,
                    rate as u32,
                );
                if !profiles.contains(&profile) {
                    profiles.push(profile);
                }
            }
            let _ = source.Shutdown();

            Ok(profiles)
        }
    }

    fn vidcap_attributes() -> Result<IMFAttributes, CaptureError> {
        unsafe {
            let mut attributes = None;
            MFCreateAttributes(&mut attributes, 1).map_err(|e| {
                CaptureError::EnumerationFailed(format!("MFCreateAttributes failed: {e}"))
            })?;
            let attributes = attributes.unwrap();
            attributes
                .SetGUID(
                    &MF_DEVSOURCE_ATTRIBUTE_SOURCE_TYPE,
                    &MF_DEVSOURCE_ATTRIBUTE_SOURCE_TYPE_VIDCAP_GUID,
                )
                .map_err(|e| {
                    CaptureError::EnumerationFailed(format!("SetGUID failed: {e}"))
                })?;
            Ok(attributes)
        }
    }

    /// Read an allocated-string attribute, freeing the MF allocation.
    fn allocated_string(activate: &IMFActivate, key: &GUID) -> Option<String> {
        unsafe {
            let mut value = PWSTR::null();
            let mut length = 0u32;
            activate
                .GetAllocatedString(key, &mut value, &mut length)
                .ok()?;
            if value.is_null() {
                return None;
            }
            let result = value.to_string().ok();
            windows::Win32::System::Com::CoTaskMemFree(Some(value.as_ptr() as *const _));
            result
        }
    }
}
