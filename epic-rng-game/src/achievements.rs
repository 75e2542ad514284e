//! Achievement catalog and the rule interpreter.
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::OnceLock;

use crate::roll::RollOutcome;
use crate::state::ProgressionState;
use crate::upgrades::UpgradeId;

const DEFAULT_ACHIEVEMENT_DATA: &str = include_str!("../data/achievements.json");

/// Predicate over the progression state and the latest roll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AchievementRule {
    RollsAtLeast { count: u64 },
    PointsAtLeast { points: u64 },
    TotalPointsAtLeast { points: u64 },
    RebirthsAtLeast { count: u32 },
    LayerAtLeast { layer: usize },
    /// The latest roll landed on the top of the layer range.
    MaxRoll,
    StreakAtLeast { streak: u32 },
    MultiplierAtLeast { multiplier: f64 },
    CriticalHitsAtLeast { count: u64 },
    PrestigeAtLeast { level: u32 },
    UpgradePurchased { upgrade: UpgradeId },
    RollsWithinWindow { count: usize, window_ms: u64 },
}

/// Inputs visible to achievement rules.
#[derive(Debug, Clone, Copy)]
pub struct AchievementContext<'a> {
    pub state: &'a ProgressionState,
    pub last_roll: Option<&'a RollOutcome>,
    pub range_max: u64,
    /// Timestamps of recent rolls, oldest first.
    pub roll_times: &'a VecDeque<u64>,
}

impl AchievementRule {
    #[must_use]
    pub fn is_met(&self, ctx: &AchievementContext<'_>) -> bool {
        let state = ctx.state;
        match *self {
            Self::RollsAtLeast { count } => state.total_rolls >= count,
            Self::PointsAtLeast { points } => state.points >= points,
            Self::TotalPointsAtLeast { points } => state.total_points_earned >= points,
            Self::RebirthsAtLeast { count } => state.rebirth_count >= count,
            Self::LayerAtLeast { layer } => state.current_layer_index >= layer,
            Self::MaxRoll => ctx
                .last_roll
                .is_some_and(|roll| roll.sub_rolls.iter().any(|sub| sub.base == ctx.range_max)),
            Self::StreakAtLeast { streak } => state.streak >= streak,
            Self::MultiplierAtLeast { multiplier } => state.multiplier >= multiplier,
            Self::CriticalHitsAtLeast { count } => state.critical_hit_count >= count,
            Self::PrestigeAtLeast { level } => state.prestige_level >= level,
            Self::UpgradePurchased { upgrade } => state.level_of(upgrade) > 0,
            Self::RollsWithinWindow { count, window_ms } => {
                let Some(&latest) = ctx.roll_times.back() else {
                    return false;
                };
                let since = latest.saturating_sub(window_ms);
                ctx.roll_times.iter().filter(|&&time| time >= since).count() >= count
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementDef {
    pub id: String,
    pub name: String,
    pub description: String,
    pub rule: AchievementRule,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AchievementCatalog {
    #[serde(default)]
    pub achievements: Vec<AchievementDef>,
}

impl AchievementCatalog {
    #[must_use]
    pub fn load_from_static() -> Self {
        Self::from_json(DEFAULT_ACHIEVEMENT_DATA).unwrap_or_else(|err| {
            log::warn!("embedded achievement catalog rejected: {err}");
            Self::default()
        })
    }

    /// # Errors
    ///
    /// Returns the decode error when the text is not a valid achievement table.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&AchievementDef> {
        self.achievements.iter().find(|def| def.id == id)
    }

    /// Ids whose rules are met and which are not yet unlocked.
    #[must_use]
    pub fn newly_met(&self, ctx: &AchievementContext<'_>) -> Vec<String> {
        self.achievements
            .iter()
            .filter(|def| !ctx.state.has_achievement(&def.id) && def.rule.is_met(ctx))
            .map(|def| def.id.clone())
            .collect()
    }

    /// Largest timing window any rule needs.
    #[must_use]
    pub fn longest_window(&self) -> Option<(usize, u64)> {
        self.achievements
            .iter()
            .filter_map(|def| match def.rule {
                AchievementRule::RollsWithinWindow { count, window_ms } => Some((count, window_ms)),
                _ => None,
            })
            .max_by_key(|&(count, _)| count)
    }
}

#[must_use]
pub fn catalog() -> &'static AchievementCatalog {
    static CATALOG: OnceLock<AchievementCatalog> = OnceLock::new();
    CATALOG.get_or_init(AchievementCatalog::load_from_static)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(state: &'a ProgressionState, times: &'a VecDeque<u64>) -> AchievementContext<'a> {
        AchievementContext {
            state,
            last_roll: None,
            range_max: 6,
            roll_times: times,
        }
    }

    #[test]
    fn embedded_catalog_parses() {
        let achievements = catalog();
        assert_eq!(achievements.achievements.len(), 16);
        assert!(achievements.get("speed_demon").is_some());
        assert_eq!(
            achievements.get("automation").map(|def| &def.rule),
            Some(&AchievementRule::UpgradePurchased {
                upgrade: UpgradeId::AutoSpeed
            })
        );
    }

    #[test]
    fn unknown_rule_kind_is_rejected() {
        let table = r#"{"achievements": [{"id": "x", "name": "X", "description": "", "rule": {"kind": "moon_phase"}}]}"#;
        assert!(AchievementCatalog::from_json(table).is_err());
        assert!(AchievementCatalog::from_json("{}").is_ok_and(|table| table.achievements.is_empty()));
        assert_eq!(AchievementCatalog::load_from_static().achievements.len(), 16);
    }

    #[test]
    fn first_roll_unlocks_after_one_roll() {
        let times = VecDeque::new();
        let mut state = ProgressionState::default();
        assert!(catalog().newly_met(&ctx(&state, &times)).is_empty());
        state.total_rolls = 1;
        assert_eq!(catalog().newly_met(&ctx(&state, &times)), vec!["first_roll".to_string()]);
        state.achievements.insert("first_roll".to_string());
        assert!(catalog().newly_met(&ctx(&state, &times)).is_empty());
    }

    #[test]
    fn speed_window_counts_recent_rolls_only() {
        let rule = AchievementRule::RollsWithinWindow {
            count: 3,
            window_ms: 1_000,
        };
        let state = ProgressionState::default();
        let slow: VecDeque<u64> = [0, 900, 2_000].into_iter().collect();
        assert!(!rule.is_met(&ctx(&state, &slow)));
        let fast: VecDeque<u64> = [0, 1_500, 2_000, 2_400].into_iter().collect();
        assert!(rule.is_met(&ctx(&state, &fast)));
        assert_eq!(catalog().longest_window(), Some((10, 1_000)));
    }
}
