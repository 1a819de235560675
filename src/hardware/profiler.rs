//! Hardware profiling: CPU, RAM and GPU capacity.

use serde::{Deserialize, Serialize};
use std::process::Command;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};

const UNKNOWN: &str = "unknown";

/// A GPU as reported by its driver.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GpuInfo {
    pub name: String,
    pub total_memory_mb: u64,
    pub free_memory_mb: u64,
    pub driver_version: String,
    pub cuda_version: String,
}

/// Point-in-time snapshot of the machine's capacity.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HardwareProfile {
    pub os: String,
    pub cpu_cores_physical: usize,
    pub cpu_cores_logical: usize,
    pub ram_total_gb: f64,
    pub ram_available_gb: f64,
    pub gpus: Vec<GpuInfo>,
}

/// Source of GPU descriptors. Implementations never fail; a missing driver
/// is an empty list.
pub trait GpuProbe: Send + Sync {
    fn probe(&self) -> Vec<GpuInfo>;
}

/// Queries NVIDIA GPUs through `nvidia-smi`.
#[derive(Debug, Default, Clone)]
pub struct NvidiaSmiProbe;

impl NvidiaSmiProbe {
    fn run(args: &[&str]) -> Option<String> {
        let output = Command::new("nvidia-smi").args(args).output().ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8(output.stdout).ok()
    }

    fn cuda_version() -> String {
        Self::run(&[])
            .and_then(|banner| parse_cuda_version(&banner))
            .unwrap_or_else(|| UNKNOWN.to_string())
    }
}

impl GpuProbe for NvidiaSmiProbe {
    fn probe(&self) -> Vec<GpuInfo> {
        let Some(csv) = Self::run(&[
            "--query-gpu=name,memory.total,memory.free,driver_version",
            "--format=csv,noheader,nounits",
        ]) else {
            tracing::debug!("nvidia-smi not available, no GPUs reported");
            return Vec::new();
        };

        let cuda_version = Self::cuda_version();
        let gpus: Vec<GpuInfo> = csv
            .lines()
            .filter_map(|line| parse_gpu_line(line, &cuda_version))
            .collect();

        tracing::debug!("Detected {} NVIDIA GPU(s)", gpus.len());
        gpus
    }
}

/// Reports no GPUs. Used where no driver is expected.
#[derive(Debug, Default, Clone)]
pub struct NoGpuProbe;

impl GpuProbe for NoGpuProbe {
    fn probe(&self) -> Vec<GpuInfo> {
        Vec::new()
    }
}

fn parse_gpu_line(line: &str, cuda_version: &str) -> Option<GpuInfo> {
    let parts: Vec<&str> = line.split(',').map(|s| s.trim()).collect();
    if parts.len() < 4 || parts[0].is_empty() {
        return None;
    }

    let version_or_unknown = |s: &str| {
        if s.is_empty() || s.contains("N/A") {
            UNKNOWN.to_string()
        } else {
            s.to_string()
        }
    };

    Some(GpuInfo {
        name: parts[0].to_string(),
        total_memory_mb: parts[1].parse().unwrap_or(0),
        free_memory_mb: parts[2].parse().unwrap_or(0),
        driver_version: version_or_unknown(parts[3]),
        cuda_version: cuda_version.to_string(),
    })
}

fn parse_cuda_version(banner: &str) -> Option<String> {
    let rest = banner.split("CUDA Version:").nth(1)?;
    let version = rest.split_whitespace().next()?.trim_end_matches('|');
    if version.is_empty() {
        None
    } else {
        Some(version.to_string())
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn bytes_to_gb(bytes: u64) -> f64 {
    round2(bytes as f64 / 1024f64.powi(3))
}

/// Reads CPU, RAM and GPU capacity from the OS.
pub struct HardwareProfiler {
    gpu_probe: Box<dyn GpuProbe>,
}

impl HardwareProfiler {
    pub fn new() -> Self {
        Self::with_gpu_probe(Box::new(NvidiaSmiProbe))
    }

    pub fn with_gpu_probe(gpu_probe: Box<dyn GpuProbe>) -> Self {
        Self { gpu_probe }
    }

    /// Take a fresh snapshot. Never fails; unreadable values fall back to
    /// their minimums.
    pub fn profile(&self) -> HardwareProfile {
        let sys = System::new_with_specifics(
            RefreshKind::new()
                .with_memory(MemoryRefreshKind::new().with_ram())
                .with_cpu(CpuRefreshKind::everything()),
        );

        let os = format!(
            "{} {}",
            System::name().unwrap_or_else(|| UNKNOWN.to_string()),
            System::kernel_version().unwrap_or_else(|| UNKNOWN.to_string())
        );

        let cpu_cores_logical = sys.cpus().len().max(1);
        let cpu_cores_physical = sys.physical_core_count().unwrap_or(1).max(1);

        let profile = HardwareProfile {
            os,
            cpu_cores_physical,
            cpu_cores_logical,
            ram_total_gb: bytes_to_gb(sys.total_memory()),
            ram_available_gb: bytes_to_gb(sys.available_memory()),
            gpus: self.gpu_probe.probe(),
        };

        tracing::debug!(
            cores = profile.cpu_cores_logical,
            ram_available_gb = profile.ram_available_gb,
            gpus = profile.gpus.len(),
            "Hardware profiled"
        );
        profile
    }
}

impl Default for HardwareProfiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe(Vec<GpuInfo>);

    impl GpuProbe for FixedProbe {
        fn probe(&self) -> Vec<GpuInfo> {
            self.0.clone()
        }
    }

    #[test]
    fn test_parse_gpu_line() {
        let gpu = parse_gpu_line("NVIDIA GeForce RTX 4090, 24564, 23010, 550.54.14", "12.4")
            .unwrap();
        assert_eq!(gpu.name, "NVIDIA GeForce RTX 4090");
        assert_eq!(gpu.total_memory_mb, 24564);
        assert_eq!(gpu.free_memory_mb, 23010);
        assert_eq!(gpu.driver_version, "550.54.14");
        assert_eq!(gpu.cuda_version, "12.4");

        let gpu = parse_gpu_line("Tesla T4, 15360, [N/A], [N/A]", UNKNOWN).unwrap();
        assert_eq!(gpu.free_memory_mb, 0);
        assert_eq!(gpu.driver_version, UNKNOWN);

        assert!(parse_gpu_line("garbage", UNKNOWN).is_none());
    }

    #[test]
    fn test_parse_cuda_version_from_banner() {
        let banner = "| NVIDIA-SMI 550.54.14    Driver Version: 550.54.14    CUDA Version: 12.4     |";
        assert_eq!(parse_cuda_version(banner).as_deref(), Some("12.4"));
        assert_eq!(parse_cuda_version("no gpu here"), None);
    }

    #[test]
    fn test_profile_without_gpu_driver() {
        let profile = HardwareProfiler::with_gpu_probe(Box::new(NoGpuProbe)).profile();
        assert!(profile.gpus.is_empty());
        assert!(profile.cpu_cores_logical >= 1);
        assert!(profile.cpu_cores_physical >= 1);
        assert!(profile.ram_total_gb >= profile.ram_available_gb);
    }

    #[test]
    fn test_profile_includes_probed_gpus() {
        let gpu = GpuInfo {
            name: "Test GPU".to_string(),
            total_memory_mb: 8192,
            free_memory_mb: 4096,
            driver_version: UNKNOWN.to_string(),
            cuda_version: UNKNOWN.to_string(),
        };
        let profile =
            HardwareProfiler::with_gpu_probe(Box::new(FixedProbe(vec![gpu.clone()]))).profile();
        assert_eq!(profile.gpus, vec![gpu]);
    }
}
