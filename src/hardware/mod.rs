//! Hardware profiling and model tier selection.

pub mod profiler;
pub mod tier;

pub use profiler::{GpuInfo, GpuProbe, HardwareProfile, HardwareProfiler, NoGpuProbe, NvidiaSmiProbe};
pub use tier::{select_model_tier, ModelRecommendation, ModelTier};
