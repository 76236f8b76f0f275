pub mod auto_filter;
pub mod distortion;
pub mod phaser;

pub use auto_filter::AutoFilter;
pub use distortion::{Distortion, Oversample};
pub use phaser::Phaser;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The effects a user can switch on and off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectType {
    AutoFilter,
    Delay,
    Reverb,
    Distortion,
    Phaser,
}

impl EffectType {
    pub const ALL: [EffectType; 5] = [
        EffectType::AutoFilter,
        EffectType::Delay,
        EffectType::Reverb,
        EffectType::Distortion,
        EffectType::Phaser,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EffectType::AutoFilter => "autoFilter",
            EffectType::Delay => "delay",
            EffectType::Reverb => "reverb",
            EffectType::Distortion => "distortion",
            EffectType::Phaser => "phaser",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, String> {
        match name {
            "autoFilter" | "filter" => Ok(EffectType::AutoFilter),
            "delay" => Ok(EffectType::Delay),
            "reverb" => Ok(EffectType::Reverb),
            "distortion" | "drive" => Ok(EffectType::Distortion),
            "phaser" => Ok(EffectType::Phaser),
            _ => Err(format!("Unknown effect: {}", name)),
        }
    }
}

impl fmt::Display for EffectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
