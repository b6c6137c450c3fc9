//! Unit abilities consulted by command authorization.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Capability a unit may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Ability {
    /// May enter a native settlement to speak with its chief.
    SpeakWithChief,
    /// May take goods from a defeated unit.
    CaptureGoods,
    /// Moves on water.
    Naval,
    /// Carries goods.
    CarryGoods,
}

impl Ability {
    /// Every ability, in canonical order.
    pub const ALL: [Ability; 4] = [
        Ability::SpeakWithChief,
        Ability::CaptureGoods,
        Ability::Naval,
        Ability::CarryGoods,
    ];

    /// Canonical identifier.
    pub const fn as_str(self) -> &'static str {
        match self {
            Ability::SpeakWithChief => "model.ability.speakWithChief",
            Ability::CaptureGoods => "model.ability.captureGoods",
            Ability::Naval => "model.ability.navalUnit",
            Ability::CarryGoods => "model.ability.carryGoods",
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Ability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ability::ALL
            .into_iter()
            .find(|ability| ability.as_str() == s)
            .ok_or_else(|| format!("unknown ability {s}"))
    }
}

/// Render an ability set as the comma-separated attribute form.
pub fn format_abilities(abilities: &BTreeSet<Ability>) -> String {
    abilities
        .iter()
        .map(|ability| ability.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse the comma-separated attribute form; empty means no abilities.
pub fn parse_abilities(raw: &str) -> Result<BTreeSet<Ability>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect()
}
