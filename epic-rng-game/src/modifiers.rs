//! Derived roll modifiers.
//!
//! Everything in [`RollModifiers`] is recomputed from the current layer, the
//! purchased upgrade levels and the prestige level. Nothing here is persisted.
use std::collections::BTreeSet;

use crate::constants::PRESTIGE_BONUS_PER_LEVEL;
use crate::layers::{Feature, LayerCatalog, RollRange};
use crate::upgrades::{UpgradeCatalog, UpgradeId, UpgradeLevels};

/// Full multiplier derivation: layer product, multiplier upgrades and prestige.
#[must_use]
pub fn derive_multiplier(
    layers: &LayerCatalog,
    upgrades: &UpgradeCatalog,
    layer_index: usize,
    levels: &UpgradeLevels,
    prestige_level: u32,
) -> f64 {
    let layer_product = layers.cumulative_multiplier(layer_index);
    let upgrade_product = [
        UpgradeId::ClickPower,
        UpgradeId::PointMultiplier,
        UpgradeId::DimensionBreak,
    ]
    .into_iter()
    .map(|id| upgrades.effect_number(levels, id))
    .product::<f64>();
    layer_product * upgrade_product * prestige_bonus(upgrades, levels, prestige_level)
}

/// Permanent prestige factor `1 + level * 0.1 * prestige_power`.
#[must_use]
pub fn prestige_bonus(upgrades: &UpgradeCatalog, levels: &UpgradeLevels, prestige_level: u32) -> f64 {
    let power = upgrades.effect_number(levels, UpgradeId::PrestigePower);
    (f64::from(prestige_level) * PRESTIGE_BONUS_PER_LEVEL).mul_add(power, 1.0)
}

/// Snapshot of every number the roll engine consults.
#[derive(Debug, Clone, PartialEq)]
pub struct RollModifiers {
    pub layer_index: usize,
    pub range: RollRange,
    pub roll_count: u32,
    pub features: BTreeSet<Feature>,
    pub total_multiplier: f64,
    /// Product of active timed events.
    pub event_multiplier: f64,
    pub critical_chance: f64,
    pub critical_power: f64,
    pub super_critical: f64,
    pub combo_power: f64,
    pub combo_threshold: f64,
    pub streak_power: f64,
    pub streak_protection: f64,
    pub mega_streak: f64,
    pub extra_dice: u32,
    pub dice_synergy: f64,
    pub perfect_roll: f64,
    pub lucky_chance: f64,
    pub auto_efficiency: f64,
    pub challenge_rewards: f64,
    pub challenge_mastery: f64,
    pub transcendence_power: f64,
    pub reality_anchor: bool,
    pub reality_control: f64,
    pub infinity_engine: f64,
    pub omnipotence: bool,
}

impl RollModifiers {
    /// Resolve modifiers for a layer, its unlocked features and owned upgrades.
    #[must_use]
    pub fn resolve(
        layers: &LayerCatalog,
        upgrades: &UpgradeCatalog,
        layer_index: usize,
        features: &BTreeSet<Feature>,
        levels: &UpgradeLevels,
        total_multiplier: f64,
    ) -> Self {
        let layer = layers.layer(layer_index);
        let number = |id| upgrades.effect_number(levels, id);
        let extra = crate::numbers::floor_f64_to_u64(number(UpgradeId::MultiRollCount));
        Self {
            layer_index: layer.index,
            range: layer.roll_range,
            roll_count: layer.roll_count.max(1),
            features: features.clone(),
            total_multiplier,
            event_multiplier: 1.0,
            critical_chance: number(UpgradeId::CriticalChance),
            critical_power: number(UpgradeId::CriticalPower),
            super_critical: number(UpgradeId::SuperCritical),
            combo_power: number(UpgradeId::ComboPower),
            combo_threshold: number(UpgradeId::ComboThreshold),
            streak_power: number(UpgradeId::StreakPower),
            streak_protection: number(UpgradeId::StreakProtection),
            mega_streak: number(UpgradeId::MegaStreak),
            extra_dice: u32::try_from(extra).unwrap_or(u32::MAX),
            dice_synergy: number(UpgradeId::MultiRollSynergy),
            perfect_roll: number(UpgradeId::PerfectRoll),
            lucky_chance: number(UpgradeId::LuckyChance),
            auto_efficiency: number(UpgradeId::AutoEfficiency),
            challenge_rewards: number(UpgradeId::ChallengeRewards),
            challenge_mastery: number(UpgradeId::ChallengeMastery),
            transcendence_power: number(UpgradeId::TranscendencePower),
            reality_anchor: upgrades.effect_flag(levels, UpgradeId::RealityAnchor),
            reality_control: number(UpgradeId::RealityControl),
            infinity_engine: number(UpgradeId::InfinityEngine),
            omnipotence: upgrades.effect_flag(levels, UpgradeId::Omnipotence),
        }
    }

    /// Plain modifiers for a layer with nothing owned and the given features.
    #[must_use]
    pub fn for_layer(layers: &LayerCatalog, layer_index: usize, features: &BTreeSet<Feature>) -> Self {
        let upgrades = crate::upgrades::catalog();
        let levels = UpgradeLevels::new();
        let multiplier = derive_multiplier(layers, upgrades, layer_index, &levels, 0);
        Self::resolve(layers, upgrades, layer_index, features, &levels, multiplier)
    }

    #[must_use]
    pub fn has(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    #[must_use]
    pub fn with_event_multiplier(mut self, factor: f64) -> Self {
        self.event_multiplier = factor;
        self
    }

    /// Dice thrown by a multi-roll.
    #[must_use]
    pub const fn dice(&self) -> u32 {
        self.roll_count.saturating_add(self.extra_dice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers;
    use crate::upgrades;

    #[test]
    fn fresh_multiplier_matches_layer_product() {
        let levels = UpgradeLevels::new();
        let multiplier = derive_multiplier(layers::catalog(), upgrades::catalog(), 0, &levels, 0);
        assert!((multiplier - 1.0).abs() < f64::EPSILON);
        let journeyman = derive_multiplier(layers::catalog(), upgrades::catalog(), 2, &levels, 0);
        assert!((journeyman - 6.0).abs() < 1e-9);
    }

    #[test]
    fn upgrades_and_prestige_compose_into_multiplier() {
        let mut levels = UpgradeLevels::new();
        levels.insert(UpgradeId::ClickPower, 2);
        levels.insert(UpgradeId::PointMultiplier, 4);
        let multiplier = derive_multiplier(layers::catalog(), upgrades::catalog(), 0, &levels, 0);
        assert!((multiplier - 4.0).abs() < 1e-9);
        let prestiged = derive_multiplier(layers::catalog(), upgrades::catalog(), 0, &levels, 2);
        assert!((prestiged - 4.8).abs() < 1e-9);
    }

    #[test]
    fn resolve_reads_neutral_values_when_nothing_owned() {
        let modifiers = RollModifiers::for_layer(layers::catalog(), 5, &BTreeSet::new());
        assert_eq!(modifiers.range, RollRange::new(50, 250));
        assert_eq!(modifiers.dice(), 3);
        assert!((modifiers.critical_chance).abs() < f64::EPSILON);
        assert!((modifiers.combo_power - 1.0).abs() < f64::EPSILON);
        assert!((modifiers.mega_streak - 1.0).abs() < f64::EPSILON);
        assert!((modifiers.infinity_engine - 1.0).abs() < f64::EPSILON);
        assert!(!modifiers.omnipotence);
    }

    #[test]
    fn owned_dice_upgrades_add_to_roll_count() {
        let mut levels = UpgradeLevels::new();
        levels.insert(UpgradeId::MultiRollCount, 2);
        let modifiers = RollModifiers::resolve(
            layers::catalog(),
            upgrades::catalog(),
            7,
            &BTreeSet::new(),
            &levels,
            1.0,
        );
        assert_eq!(modifiers.dice(), 6);
    }
}
