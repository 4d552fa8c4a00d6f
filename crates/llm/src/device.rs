//! Compute device detection for the on-device model

use std::path::Path;

use sales_coach_config::DevicePreference;
use sales_coach_core::ComputeDevice;

/// Device nodes whose presence indicates a usable accelerator
const ACCELERATOR_NODES: &[&str] = &["/dev/nvidia0", "/dev/dri/renderD128"];

/// Resolve the configured preference to a concrete device
///
/// `Auto` probes once for an accelerator and falls back to CPU.
pub fn detect_device(preference: DevicePreference) -> ComputeDevice {
    let device = match preference {
        DevicePreference::Gpu => ComputeDevice::Gpu,
        DevicePreference::Cpu => ComputeDevice::Cpu,
        DevicePreference::Auto => {
            if has_accelerator() {
                ComputeDevice::Gpu
            } else {
                ComputeDevice::Cpu
            }
        }
    };

    tracing::info!(?preference, %device, "Resolved on-device compute device");
    device
}

fn has_accelerator() -> bool {
    if cuda_devices_visible(std::env::var("CUDA_VISIBLE_DEVICES").ok().as_deref()) {
        return true;
    }
    if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
        return true;
    }
    ACCELERATOR_NODES.iter().any(|node| Path::new(node).exists())
}

/// `CUDA_VISIBLE_DEVICES` set to an empty string or `-1` hides every GPU
fn cuda_devices_visible(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        Some("") | Some("-1") | None => false,
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_preferences() {
        assert_eq!(detect_device(DevicePreference::Cpu), ComputeDevice::Cpu);
        assert_eq!(detect_device(DevicePreference::Gpu), ComputeDevice::Gpu);
    }

    #[test]
    fn test_cuda_visibility() {
        assert!(cuda_devices_visible(Some("0")));
        assert!(cuda_devices_visible(Some("0,1")));
        assert!(!cuda_devices_visible(Some("-1")));
        assert!(!cuda_devices_visible(Some(" ")));
        assert!(!cuda_devices_visible(None));
    }
}
