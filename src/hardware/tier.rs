//! Model tier selection from a hardware profile.
//!
//! Budgets approximate the memory a 4-bit quantized model of each size needs:
//! tiny (1-3B) ~2.5 GB, small (7B) ~5.5 GB, medium (13B) ~9.5 GB,
//! large (32B) ~20 GB.

use serde::{Deserialize, Serialize};

use super::profiler::HardwareProfile;

/// GPU pools at or below this many free GB are ignored in favour of RAM.
const MIN_USABLE_VRAM_GB: f64 = 2.0;
/// RAM kept back for the OS when running on system memory.
const OS_RESERVED_RAM_GB: f64 = 4.0;

/// Capability bucket for a locally-runnable model, ordered tiny < large.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Tiny,
    Small,
    Medium,
    Large,
}

impl ModelTier {
    /// Human-readable size label.
    pub fn label(&self) -> &'static str {
        match self {
            ModelTier::Tiny => "Tiny (1-3B)",
            ModelTier::Small => "Small (7B)",
            ModelTier::Medium => "Medium (13B)",
            ModelTier::Large => "Large (32B)",
        }
    }

    /// Ollama tag suggested for this tier.
    pub fn suggested_model(&self) -> &'static str {
        match self {
            ModelTier::Tiny => "phi3:mini",
            ModelTier::Small => "llama3:8b",
            ModelTier::Medium => "mistral-nemo:12b",
            ModelTier::Large => "qwen2.5:32b",
        }
    }
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelTier::Tiny => write!(f, "tiny"),
            ModelTier::Small => write!(f, "small"),
            ModelTier::Medium => write!(f, "medium"),
            ModelTier::Large => write!(f, "large"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModelRecommendation {
    pub tier: ModelTier,
    pub reasoning: String,
    pub max_memory_usage_gb: f64,
    pub suggested_model: String,
}

/// Descending `(minimum GB, tier, expected peak GB)`; first match wins.
const TIER_THRESHOLDS: &[(f64, ModelTier, f64)] = &[
    (22.0, ModelTier::Large, 20.0),
    (10.0, ModelTier::Medium, 9.5),
    (6.0, ModelTier::Small, 5.5),
    (3.0, ModelTier::Tiny, 2.5),
];

/// Map a hardware profile to a model tier. Pure: equal profiles give equal
/// recommendations.
pub fn select_model_tier(profile: &HardwareProfile) -> ModelRecommendation {
    let total_vram_gb: f64 =
        profile.gpus.iter().map(|g| g.free_memory_mb as f64).sum::<f64>() / 1024.0;
    let usable_ram_gb = (profile.ram_available_gb - OS_RESERVED_RAM_GB).max(0.0);

    let (available, source) = if total_vram_gb > MIN_USABLE_VRAM_GB {
        (total_vram_gb, "VRAM")
    } else {
        (usable_ram_gb, "System RAM (Slow)")
    };

    let recommendation = TIER_THRESHOLDS
        .iter()
        .find(|(min, _, _)| available >= *min)
        .map(|&(_, tier, peak)| ModelRecommendation {
            tier,
            reasoning: format!("Available {}: {:.1}GB", source, available),
            max_memory_usage_gb: peak,
            suggested_model: tier.suggested_model().to_string(),
        })
        .unwrap_or_else(|| ModelRecommendation {
            tier: ModelTier::Tiny,
            reasoning: format!(
                "Critically low memory ({:.1}GB). Restricted to Tiny.",
                available
            ),
            max_memory_usage_gb: 2.0,
            suggested_model: ModelTier::Tiny.suggested_model().to_string(),
        });

    tracing::debug!(
        tier = %recommendation.tier,
        available_gb = available,
        source,
        "Selected model tier"
    );
    recommendation
}
