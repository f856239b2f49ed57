// Linux probe: VAAPI render nodes + vainfo

use std::path::{Path, PathBuf};
use std::process::Command;

use super::HardwareProbe;
use crate::models::CapabilityRecord;

pub struct AmdVaapiProbe {
    render_nodes: Vec<PathBuf>,
}

impl AmdVaapiProbe {
    pub fn new() -> Self {
        // renderD128 is the first render node; multi-GPU hosts get a few more
        let render_nodes = (128..132)
            .map(|n| PathBuf::from(format!("/dev/dri/renderD{}", n)))
            .filter(|p| p.exists())
            .collect();
        Self { render_nodes }
    }

    /// Map `vainfo` text for one render node onto a record.
    pub fn parse_vainfo_output(output: &str, device: &Path) -> CapabilityRecord {
        let mut record = CapabilityRecord::cpu_only();

        record.gpu_model = output
            .lines()
            .find(|l| l.contains("Driver version"))
            .and_then(|l| l.splitn(2, ':').nth(1))
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| "VAAPI device".to_string());

        // An encode entrypoint on any profile means the silicon can encode
        let has_encoder = output
            .lines()
            .any(|l| l.contains("VAEntrypointEncSlice") || l.contains("VAEntrypointEncSliceLP"));

        let has_hevc_encoder = output.lines().any(|l| {
            (l.contains("HEVC") || l.contains("H265"))
                && (l.contains("VAEntrypointEncSlice") || l.contains("VAEntrypointEncSliceLP"))
        });

        record.hardware_encoder_available = has_encoder;
        record.hevc_supported = has_hevc_encoder;
        if has_encoder {
            record.encoder_device_path = Some(device.to_path_buf());
        }
        record
    }
}

impl Default for AmdVaapiProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareProbe for AmdVaapiProbe {
    fn name(&self) -> &'static str {
        "amd-vaapi"
    }

    fn probe(&self) -> Option<CapabilityRecord> {
        for node in &self.render_nodes {
            let output = Command::new("vainfo")
                .args(["--display", "drm", "--device"])
                .arg(node)
                .output();

            let output = match output {
                Ok(out) => out,
                Err(_) => return None, // vainfo not installed
            };

            if !output.status.success() {
                continue;
            }

            let text = String::from_utf8_lossy(&output.stdout);
            let record = Self::parse_vainfo_output(&text, node);
            if record.hardware_encoder_available {
                return Some(record);
            }
        }
        None
    }
}
