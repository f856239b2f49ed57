// Fallback probe for hosts without a recognized GPU path

use super::HardwareProbe;
use crate::models::CapabilityRecord;

pub struct GenericCpuProbe;

impl HardwareProbe for GenericCpuProbe {
    fn name(&self) -> &'static str {
        "generic-cpu"
    }

    fn probe(&self) -> Option<CapabilityRecord> {
        Some(CapabilityRecord::cpu_only())
    }
}
