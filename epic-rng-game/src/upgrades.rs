//! Upgrade catalog and the effect interpreter.
//!
//! Every upgrade carries an [`EffectSpec`], a tagged description of how its
//! effect scales with purchased level. Effects are pure functions of level, so
//! any derived value can be rebuilt from the purchased levels alone.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

use crate::numbers::{floor_f64_to_u64, level_exponent, u64_to_f64};

const DEFAULT_UPGRADE_DATA: &str = include_str!("../data/upgrades.json");

/// Purchased level per upgrade.
pub type UpgradeLevels = BTreeMap<UpgradeId, u32>;

/// Lookup of an id string that is not part of the catalog.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown upgrade id: {0}")]
pub struct UnknownUpgradeId(pub String);

/// Identifier of every purchasable upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeId {
    ClickPower,
    PointMultiplier,
    AutoSpeed,
    AutoEfficiency,
    LuckyChance,
    ComboPower,
    ComboThreshold,
    CriticalChance,
    CriticalPower,
    SuperCritical,
    StreakPower,
    StreakProtection,
    MegaStreak,
    MultiRollCount,
    MultiRollSynergy,
    PerfectRoll,
    PrestigeGeneration,
    PrestigePower,
    PrestigeInvestment,
    ChallengeRewards,
    ChallengeMastery,
    TranscendencePower,
    RealityAnchor,
    RealityControl,
    DimensionBreak,
    InfinityEngine,
    Omnipotence,
}

impl UpgradeId {
    pub const ALL: [Self; 27] = [
        Self::ClickPower,
        Self::PointMultiplier,
        Self::AutoSpeed,
        Self::AutoEfficiency,
        Self::LuckyChance,
        Self::ComboPower,
        Self::ComboThreshold,
        Self::CriticalChance,
        Self::CriticalPower,
        Self::SuperCritical,
        Self::StreakPower,
        Self::StreakProtection,
        Self::MegaStreak,
        Self::MultiRollCount,
        Self::MultiRollSynergy,
        Self::PerfectRoll,
        Self::PrestigeGeneration,
        Self::PrestigePower,
        Self::PrestigeInvestment,
        Self::ChallengeRewards,
        Self::ChallengeMastery,
        Self::TranscendencePower,
        Self::RealityAnchor,
        Self::RealityControl,
        Self::DimensionBreak,
        Self::InfinityEngine,
        Self::Omnipotence,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClickPower => "click_power",
            Self::PointMultiplier => "point_multiplier",
            Self::AutoSpeed => "auto_speed",
            Self::AutoEfficiency => "auto_efficiency",
            Self::LuckyChance => "lucky_chance",
            Self::ComboPower => "combo_power",
            Self::ComboThreshold => "combo_threshold",
            Self::CriticalChance => "critical_chance",
            Self::CriticalPower => "critical_power",
            Self::SuperCritical => "super_critical",
            Self::StreakPower => "streak_power",
            Self::StreakProtection => "streak_protection",
            Self::MegaStreak => "mega_streak",
            Self::MultiRollCount => "multi_roll_count",
            Self::MultiRollSynergy => "multi_roll_synergy",
            Self::PerfectRoll => "perfect_roll",
            Self::PrestigeGeneration => "prestige_generation",
            Self::PrestigePower => "prestige_power",
            Self::PrestigeInvestment => "prestige_investment",
            Self::ChallengeRewards => "challenge_rewards",
            Self::ChallengeMastery => "challenge_mastery",
            Self::TranscendencePower => "transcendence_power",
            Self::RealityAnchor => "reality_anchor",
            Self::RealityControl => "reality_control",
            Self::DimensionBreak => "dimension_break",
            Self::InfinityEngine => "infinity_engine",
            Self::Omnipotence => "omnipotence",
        }
    }
}

impl FromStr for UpgradeId {
    type Err = UnknownUpgradeId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownUpgradeId(s.to_string()))
    }
}

impl fmt::Display for UpgradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeCategory {
    Basic,
    Automation,
    Luck,
    Combo,
    Critical,
    Streak,
    Multiroll,
    Prestige,
    Challenge,
    Transcendence,
    Reality,
    Infinity,
}

/// Evaluated effect of an upgrade at some level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EffectValue {
    Number(f64),
    Flag(bool),
}

impl EffectValue {
    /// Numeric view; flags read as `1.0`/`0.0`.
    #[must_use]
    pub const fn as_number(self) -> f64 {
        match self {
            Self::Number(value) => value,
            Self::Flag(true) => 1.0,
            Self::Flag(false) => 0.0,
        }
    }

    #[must_use]
    pub fn as_flag(self) -> bool {
        match self {
            Self::Number(value) => value != 0.0,
            Self::Flag(flag) => flag,
        }
    }
}

/// Tagged description of how an effect scales with level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectSpec {
    /// `base + per_level * level`
    Linear { base: f64, per_level: f64 },
    /// `max(floor_ms, start_ms - step_ms * level)`
    Interval {
        start_ms: f64,
        step_ms: f64,
        floor_ms: f64,
    },
    /// `value` once purchased, `otherwise` before.
    Unlock { value: f64, otherwise: f64 },
    /// On once purchased.
    Toggle,
    /// `base ^ level`
    Exponential { base: f64 },
}

impl EffectSpec {
    #[must_use]
    pub fn evaluate(&self, level: u32) -> EffectValue {
        let lvl = f64::from(level);
        match *self {
            Self::Linear { base, per_level } => EffectValue::Number(per_level.mul_add(lvl, base)),
            Self::Interval {
                start_ms,
                step_ms,
                floor_ms,
            } => EffectValue::Number(step_ms.mul_add(-lvl, start_ms).max(floor_ms)),
            Self::Unlock { value, otherwise } => {
                EffectValue::Number(if level > 0 { value } else { otherwise })
            }
            Self::Toggle => EffectValue::Flag(level > 0),
            Self::Exponential { base } => EffectValue::Number(base.powi(level_exponent(level))),
        }
    }
}

/// Static definition of one upgrade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeDef {
    pub id: UpgradeId,
    pub name: String,
    pub description: String,
    pub base_cost: u64,
    pub cost_multiplier: f64,
    pub max_level: u32,
    /// Minimum layer index at which the upgrade can be bought.
    pub required_layer: usize,
    pub category: UpgradeCategory,
    pub effect: EffectSpec,
}

impl UpgradeDef {
    /// Price of the next level when `level` levels are already owned.
    #[must_use]
    pub fn cost_at(&self, level: u32) -> u64 {
        let growth = self.cost_multiplier.powi(level_exponent(level));
        floor_f64_to_u64(u64_to_f64(self.base_cost) * growth)
    }

    #[must_use]
    pub fn effect_at(&self, level: u32) -> EffectValue {
        self.effect.evaluate(level.min(self.max_level))
    }

    #[must_use]
    pub const fn is_maxed(&self, level: u32) -> bool {
        level >= self.max_level
    }
}

#[derive(Debug, Deserialize)]
struct UpgradeFile {
    #[serde(default)]
    upgrades: Vec<UpgradeDef>,
}

/// Read-only table of upgrade definitions.
#[derive(Debug, Clone, Default)]
pub struct UpgradeCatalog {
    upgrades: Vec<UpgradeDef>,
}

impl UpgradeCatalog {
    /// Parse the embedded upgrade table; an unreadable table yields no upgrades.
    #[must_use]
    pub fn load_from_static() -> Self {
        match Self::from_json(DEFAULT_UPGRADE_DATA) {
            Ok(catalog) => catalog,
            Err(err) => {
                log::warn!("embedded upgrade catalog rejected: {err}");
                Self::default()
            }
        }
    }

    /// Parse a table shaped like `data/upgrades.json`.
    ///
    /// # Errors
    ///
    /// Returns the decode error when the text is not a valid upgrade table.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let file: UpgradeFile = serde_json::from_str(json)?;
        Ok(Self {
            upgrades: file.upgrades,
        })
    }

    #[must_use]
    pub fn get(&self, id: UpgradeId) -> Option<&UpgradeDef> {
        self.upgrades.iter().find(|upgrade| upgrade.id == id)
    }

    /// Resolve an id string to its definition.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownUpgradeId`] when the string names no upgrade in the table.
    pub fn lookup(&self, id: &str) -> Result<&UpgradeDef, UnknownUpgradeId> {
        let parsed = id.parse::<UpgradeId>()?;
        self.get(parsed)
            .ok_or_else(|| UnknownUpgradeId(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &UpgradeDef> {
        self.upgrades.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.upgrades.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upgrades.is_empty()
    }

    /// Effect of `id` at the owned level, or its level-zero value when unowned.
    #[must_use]
    pub fn effect(&self, levels: &UpgradeLevels, id: UpgradeId) -> EffectValue {
        let level = levels.get(&id).copied().unwrap_or(0);
        self.get(id)
            .map_or(EffectValue::Number(0.0), |upgrade| upgrade.effect_at(level))
    }

    #[must_use]
    pub fn effect_number(&self, levels: &UpgradeLevels, id: UpgradeId) -> f64 {
        self.effect(levels, id).as_number()
    }

    #[must_use]
    pub fn effect_flag(&self, levels: &UpgradeLevels, id: UpgradeId) -> bool {
        levels.get(&id).copied().unwrap_or(0) > 0 && self.effect(levels, id).as_flag()
    }
}

#[must_use]
pub fn catalog() -> &'static UpgradeCatalog {
    static CATALOG: OnceLock<UpgradeCatalog> = OnceLock::new();
    CATALOG.get_or_init(UpgradeCatalog::load_from_static)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_catalog_covers_every_id() {
        let upgrades = catalog();
        assert_eq!(upgrades.len(), UpgradeId::ALL.len());
        for id in UpgradeId::ALL {
            let def = upgrades.get(id).expect("every id has a definition");
            assert_eq!(def.id, id);
            assert!(def.max_level >= 1);
            assert!(def.required_layer <= 10);
        }
    }

    #[test]
    fn malformed_tables_are_rejected() {
        assert!(UpgradeCatalog::from_json("{\"upgrades\": 3}").is_err());
        assert!(UpgradeCatalog::from_json("not json").is_err());
        assert!(UpgradeCatalog::from_json("{\"upgrades\": [{\"id\": \"warp_drive\"}]}").is_err());
        assert!(UpgradeCatalog::from_json("{}").is_ok_and(|table| table.is_empty()));
        assert_eq!(UpgradeCatalog::load_from_static().len(), UpgradeId::ALL.len());
    }

    #[test]
    fn id_strings_round_trip() {
        for id in UpgradeId::ALL {
            assert_eq!(id.as_str().parse::<UpgradeId>(), Ok(id));
        }
        assert_eq!(
            "warp_drive".parse::<UpgradeId>(),
            Err(UnknownUpgradeId("warp_drive".to_string()))
        );
        assert!(catalog().lookup("warp_drive").is_err());
        assert_eq!(catalog().lookup("click_power").map(|u| u.base_cost), Ok(50));
    }

    #[test]
    fn costs_follow_exponential_growth() {
        let click = catalog().get(UpgradeId::ClickPower).unwrap();
        assert_eq!(click.cost_at(0), 50);
        assert_eq!(click.cost_at(1), 75);
        assert_eq!(click.cost_at(2), 112);
        let point = catalog().get(UpgradeId::PointMultiplier).unwrap();
        assert_eq!(point.cost_at(3), 800);
    }

    #[test]
    fn costs_strictly_increase_when_multiplier_above_one() {
        for upgrade in catalog().iter() {
            if upgrade.cost_multiplier > 1.0 {
                for level in 0..upgrade.max_level {
                    assert!(
                        upgrade.cost_at(level + 1) > upgrade.cost_at(level),
                        "{} level {level}",
                        upgrade.id
                    );
                }
            }
        }
    }

    #[test]
    fn effect_kinds_evaluate() {
        let linear = EffectSpec::Linear {
            base: 1.0,
            per_level: 0.5,
        };
        assert_eq!(linear.evaluate(3), EffectValue::Number(2.5));
        let interval = EffectSpec::Interval {
            start_ms: 1000.0,
            step_ms: 50.0,
            floor_ms: 200.0,
        };
        assert_eq!(interval.evaluate(4), EffectValue::Number(800.0));
        assert_eq!(interval.evaluate(30), EffectValue::Number(200.0));
        let unlock = EffectSpec::Unlock {
            value: 1000.0,
            otherwise: 1.0,
        };
        assert_eq!(unlock.evaluate(0), EffectValue::Number(1.0));
        assert_eq!(unlock.evaluate(1), EffectValue::Number(1000.0));
        assert_eq!(EffectSpec::Toggle.evaluate(1), EffectValue::Flag(true));
        let exp = EffectSpec::Exponential { base: 2.0 };
        assert_eq!(exp.evaluate(0), EffectValue::Number(1.0));
        assert_eq!(exp.evaluate(5), EffectValue::Number(32.0));
    }

    #[test]
    fn unowned_upgrades_report_level_zero_effect() {
        let levels = UpgradeLevels::new();
        let upgrades = catalog();
        assert!((upgrades.effect_number(&levels, UpgradeId::ClickPower) - 1.0).abs() < 1e-12);
        assert!((upgrades.effect_number(&levels, UpgradeId::AutoSpeed) - 1000.0).abs() < 1e-12);
        assert!(!upgrades.effect_flag(&levels, UpgradeId::RealityAnchor));
        let mut owned = UpgradeLevels::new();
        owned.insert(UpgradeId::RealityAnchor, 1);
        assert!(upgrades.effect_flag(&owned, UpgradeId::RealityAnchor));
    }

    #[test]
    fn effect_spec_serializes_as_tagged_variant() {
        let spec = EffectSpec::Unlock {
            value: 0.02,
            otherwise: 0.0,
        };
        let json = serde_json::to_value(spec).unwrap();
        assert_eq!(json["kind"], "unlock");
        let back: EffectSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, spec);
    }
}
