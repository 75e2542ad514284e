//! Persisted progression state.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::layers::Feature;
use crate::upgrades::UpgradeLevels;

/// Everything the progression model owns and persists between sessions.
///
/// `multiplier` and `unlocked_features` are derived values. They are stored
/// for display and compatibility but always rebuilt from the layer index,
/// the upgrade levels and the prestige level on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionState {
    pub points: u64,
    pub total_points_earned: u64,
    pub current_layer_index: usize,
    pub rebirth_count: u32,
    pub multiplier: f64,
    pub combo: u32,
    pub streak: u32,
    pub total_rolls: u64,
    pub critical_hit_count: u64,
    /// Largest single-roll award seen.
    pub best_roll: u64,
    pub upgrades: UpgradeLevels,
    pub unlocked_features: BTreeSet<Feature>,
    pub achievements: BTreeSet<String>,
    pub prestige_level: u32,
    pub prestige_points: f64,
    pub auto_roll_enabled: bool,
}

impl Default for ProgressionState {
    fn default() -> Self {
        Self {
            points: 0,
            total_points_earned: 0,
            current_layer_index: 0,
            rebirth_count: 0,
            multiplier: 1.0,
            combo: 0,
            streak: 0,
            total_rolls: 0,
            critical_hit_count: 0,
            best_roll: 0,
            upgrades: UpgradeLevels::new(),
            unlocked_features: BTreeSet::new(),
            achievements: BTreeSet::new(),
            prestige_level: 0,
            prestige_points: 0.0,
            auto_roll_enabled: true,
        }
    }
}

impl ProgressionState {
    #[must_use]
    pub fn level_of(&self, id: crate::upgrades::UpgradeId) -> u32 {
        self.upgrades.get(&id).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn has_feature(&self, feature: Feature) -> bool {
        self.unlocked_features.contains(&feature)
    }

    #[must_use]
    pub fn has_achievement(&self, id: &str) -> bool {
        self.achievements.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upgrades::UpgradeId;

    #[test]
    fn defaults_start_at_the_first_layer() {
        let state = ProgressionState::default();
        assert_eq!(state.points, 0);
        assert_eq!(state.current_layer_index, 0);
        assert!((state.multiplier - 1.0).abs() < f64::EPSILON);
        assert!(state.auto_roll_enabled);
        assert_eq!(state.level_of(UpgradeId::ClickPower), 0);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let state: ProgressionState =
            serde_json::from_str(r#"{"points": 12, "upgrades": {"click_power": 2}}"#).unwrap();
        assert_eq!(state.points, 12);
        assert_eq!(state.level_of(UpgradeId::ClickPower), 2);
        assert_eq!(state.total_rolls, 0);
    }

    #[test]
    fn serialized_keys_use_snake_case() {
        let json = serde_json::to_value(ProgressionState::default()).unwrap();
        for key in ["points", "current_layer_index", "multiplier", "total_rolls"] {
            assert!(json.get(key).is_some(), "{key}");
        }
    }
}
