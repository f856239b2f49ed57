// macOS probe: system_profiler + VideoToolbox
//
// Every Mac that can run this ships VideoToolbox; the GPU model string is
// what decides whether the HEVC hardware path is worth attempting.

use std::process::Command;

use super::HardwareProbe;
use crate::models::CapabilityRecord;

pub struct AppleSiliconProbe;

impl AppleSiliconProbe {
    /// Map `system_profiler SPDisplaysDataType` text onto a record.
    pub fn parse_displays_output(output: &str) -> CapabilityRecord {
        let mut record = CapabilityRecord::cpu_only();
        record.gpu_model = "Unknown".to_string();

        if output.contains("AMD") || output.contains("Radeon") {
            record.gpu_model = if output.contains("RX 6600") {
                "AMD RX 6600".to_string()
            } else if output.contains("Radeon") {
                "AMD Radeon".to_string()
            } else {
                "AMD GPU".to_string()
            };
            record.hardware_encoder_available = true;
        } else if output.contains("Intel") {
            record.gpu_model = "Intel GPU".to_string();
            record.hardware_encoder_available = true;
        } else if output.contains("Apple")
            || output.contains("M1")
            || output.contains("M2")
            || output.contains("M3")
        {
            record.gpu_model = if output.contains("M1") {
                "Apple M1".to_string()
            } else if output.contains("M2") {
                "Apple M2".to_string()
            } else if output.contains("M3") {
                "Apple M3".to_string()
            } else {
                "Apple Silicon".to_string()
            };
            record.hardware_encoder_available = true;
        }

        // VideoToolbox exposes an HEVC encoder on every GPU we recognize
        record.hevc_supported = record.hardware_encoder_available;
        record
    }
}

impl HardwareProbe for AppleSiliconProbe {
    fn name(&self) -> &'static str {
        "apple-videotoolbox"
    }

    fn probe(&self) -> Option<CapabilityRecord> {
        let output = Command::new("system_profiler")
            .arg("SPDisplaysDataType")
            .output()
            .ok()?;

        if !output.status.success() {
            return None;
        }

        let text = String::from_utf8_lossy(&output.stdout);
        Some(Self::parse_displays_output(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_apple_silicon() {
        let out = "Graphics/Displays:\n\n    Apple M2:\n\n      Chipset Model: Apple M2\n";
        let record = AppleSiliconProbe::parse_displays_output(out);
        assert_eq!(record.gpu_model, "Apple M2");
        assert!(record.hardware_encoder_available);
        assert!(record.hevc_supported);
    }

    #[test]
    fn recognizes_amd_model() {
        let out = "Chipset Model: AMD Radeon RX 6600 XT\n";
        let record = AppleSiliconProbe::parse_displays_output(out);
        assert_eq!(record.gpu_model, "AMD RX 6600");
        assert!(record.hevc_supported);
    }

    #[test]
    fn unknown_gpu_means_no_hardware_path() {
        let record = AppleSiliconProbe::parse_displays_output("Graphics/Displays:\n");
        assert_eq!(record.gpu_model, "Unknown");
        assert!(!record.hardware_encoder_available);
        assert!(!record.hevc_supported);
    }
}
