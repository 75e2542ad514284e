use std::fmt;

use epic_rng_game::{ProgressionModel, UpgradeCategory, UpgradeId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Prestige points one investment costs.
const INVESTMENT_COST: f64 = 10.0;

/// Something a simulated player can do on their turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction {
    Roll,
    Purchase(UpgradeId),
    Rebirth,
    Prestige,
    InvestPrestige,
    Idle,
}

impl PlayerAction {
    #[must_use]
    pub fn label(self) -> String {
        match self {
            Self::Roll => "roll".to_string(),
            Self::Purchase(id) => format!("buy {id}"),
            Self::Rebirth => "rebirth".to_string(),
            Self::Prestige => "prestige".to_string(),
            Self::InvestPrestige => "invest".to_string(),
            Self::Idle => "idle".to_string(),
        }
    }
}

/// Decision returned by a [`PlayerPolicy`]
#[derive(Debug, Clone)]
pub struct PolicyDecision {
    pub action: PlayerAction,
    pub rationale: Option<String>,
}

impl PolicyDecision {
    #[must_use]
    pub fn new(action: PlayerAction, rationale: Option<String>) -> Self {
        Self { action, rationale }
    }
}

/// Policy interface for automated play strategies.
pub trait PlayerPolicy {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    /// Pick the next action for the current model.
    fn decide(&mut self, model: &ProgressionModel) -> PolicyDecision;
}

/// Built-in gameplay strategies for automated runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GameplayStrategy {
    Greedy,
    RebirthRush,
    Idle,
    PrestigeHunter,
    MonteCarlo,
}

impl GameplayStrategy {
    pub const ALL: [Self; 5] = [
        Self::Greedy,
        Self::RebirthRush,
        Self::Idle,
        Self::PrestigeHunter,
        Self::MonteCarlo,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            GameplayStrategy::Greedy => "Greedy",
            GameplayStrategy::RebirthRush => "Rebirth Rush",
            GameplayStrategy::Idle => "Idle",
            GameplayStrategy::PrestigeHunter => "Prestige Hunter",
            GameplayStrategy::MonteCarlo => "Monte Carlo",
        }
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn PlayerPolicy + Send> {
        match self {
            GameplayStrategy::Greedy => Box::new(GreedyPolicy),
            GameplayStrategy::RebirthRush => Box::new(RebirthRushPolicy),
            GameplayStrategy::Idle => Box::new(IdlePolicy),
            GameplayStrategy::PrestigeHunter => Box::new(PrestigeHunterPolicy),
            GameplayStrategy::MonteCarlo => Box::new(MonteCarloPolicy::new(seed)),
        }
    }
}

impl fmt::Display for GameplayStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

struct GreedyPolicy;
struct RebirthRushPolicy;
struct IdlePolicy;
struct PrestigeHunterPolicy;

struct MonteCarloPolicy {
    rng: ChaCha20Rng,
    roll_weight: f64,
}

impl MonteCarloPolicy {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            roll_weight: 0.6,
        }
    }
}

impl PlayerPolicy for GreedyPolicy {
    fn name(&self) -> &'static str {
        "Greedy"
    }

    fn decide(&mut self, model: &ProgressionModel) -> PolicyDecision {
        if model.can_rebirth() {
            return PolicyDecision::new(PlayerAction::Rebirth, Some("threshold met".to_string()));
        }
        if let Some(id) = cheapest_affordable(model) {
            return PolicyDecision::new(
                PlayerAction::Purchase(id),
                Some(format!("cost {}", model.upgrade_cost(id))),
            );
        }
        PolicyDecision::new(PlayerAction::Roll, None)
    }
}

impl PlayerPolicy for RebirthRushPolicy {
    fn name(&self) -> &'static str {
        "Rebirth Rush"
    }

    fn decide(&mut self, model: &ProgressionModel) -> PolicyDecision {
        if model.can_rebirth() {
            return PolicyDecision::new(PlayerAction::Rebirth, Some("threshold met".to_string()));
        }
        let points = model.state().points;
        let bargain = model
            .available_upgrades()
            .into_iter()
            .filter(|def| matches!(def.category, UpgradeCategory::Basic))
            .map(|def| (def.id, model.upgrade_cost(def.id)))
            .find(|&(_, cost)| cost.saturating_mul(4) <= points);
        if let Some((id, cost)) = bargain {
            return PolicyDecision::new(PlayerAction::Purchase(id), Some(format!("cost {cost}")));
        }
        PolicyDecision::new(PlayerAction::Roll, None)
    }
}

impl PlayerPolicy for IdlePolicy {
    fn name(&self) -> &'static str {
        "Idle"
    }

    fn decide(&mut self, model: &ProgressionModel) -> PolicyDecision {
        if model.can_rebirth() {
            return PolicyDecision::new(PlayerAction::Rebirth, None);
        }
        let automation_first = model
            .available_upgrades()
            .into_iter()
            .filter(|def| matches!(def.category, UpgradeCategory::Automation))
            .map(|def| def.id)
            .find(|&id| model.can_afford_upgrade(id));
        if let Some(id) = automation_first.or_else(|| cheapest_affordable(model)) {
            return PolicyDecision::new(PlayerAction::Purchase(id), None);
        }
        if !model.auto_roll_active() {
            return PolicyDecision::new(PlayerAction::Roll, Some("auto-roll locked".to_string()));
        }
        PolicyDecision::new(PlayerAction::Idle, Some("waiting on auto-roll".to_string()))
    }
}

impl PlayerPolicy for PrestigeHunterPolicy {
    fn name(&self) -> &'static str {
        "Prestige Hunter"
    }

    fn decide(&mut self, model: &ProgressionModel) -> PolicyDecision {
        let state = model.state();
        if model.can_prestige() {
            return PolicyDecision::new(
                PlayerAction::Prestige,
                Some(format!("requirement {}", model.prestige_requirement())),
            );
        }
        if state.level_of(UpgradeId::PrestigeInvestment) > 0
            && state.prestige_points >= INVESTMENT_COST
            && !model
                .events()
                .is_active(epic_rng_game::TimedEventKind::PrestigeInvestment)
        {
            return PolicyDecision::new(
                PlayerAction::InvestPrestige,
                Some(format!("balance {:.1}", state.prestige_points)),
            );
        }
        GreedyPolicy.decide(model)
    }
}

impl PlayerPolicy for MonteCarloPolicy {
    fn name(&self) -> &'static str {
        "Monte Carlo"
    }

    fn decide(&mut self, model: &ProgressionModel) -> PolicyDecision {
        if model.can_rebirth() && self.rng.gen_bool(0.5) {
            return PolicyDecision::new(PlayerAction::Rebirth, Some("coin flip".to_string()));
        }
        if self.rng.r#gen::<f64>() < self.roll_weight {
            return PolicyDecision::new(PlayerAction::Roll, None);
        }
        let affordable: Vec<UpgradeId> = model
            .available_upgrades()
            .into_iter()
            .map(|def| def.id)
            .filter(|&id| model.can_afford_upgrade(id))
            .collect();
        if affordable.is_empty() {
            return PolicyDecision::new(PlayerAction::Roll, Some("nothing affordable".to_string()));
        }
        let pick = affordable[self.rng.gen_range(0..affordable.len())];
        PolicyDecision::new(
            PlayerAction::Purchase(pick),
            Some(format!("1 of {}", affordable.len())),
        )
    }
}

fn cheapest_affordable(model: &ProgressionModel) -> Option<UpgradeId> {
    model
        .available_upgrades()
        .first()
        .map(|def| def.id)
        .filter(|&id| model.can_afford_upgrade(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use epic_rng_game::ProgressionState;

    fn model_with(points: u64, layer: usize) -> ProgressionModel {
        ProgressionModel::from_state(ProgressionState {
            points,
            current_layer_index: layer,
            ..ProgressionState::default()
        })
    }

    #[test]
    fn greedy_rebirths_before_buying() {
        let model = model_with(1_000, 0);
        let decision = GameplayStrategy::Greedy.create_policy(1).decide(&model);
        assert_eq!(decision.action, PlayerAction::Rebirth);
    }

    #[test]
    fn greedy_rolls_when_broke() {
        let model = ProgressionModel::new();
        let decision = GameplayStrategy::Greedy.create_policy(1).decide(&model);
        assert_eq!(decision.action, PlayerAction::Roll);
    }

    #[test]
    fn idle_stops_rolling_once_auto_roll_unlocks() {
        let mut policy = GameplayStrategy::Idle.create_policy(1);
        assert_eq!(
            policy.decide(&ProgressionModel::new()).action,
            PlayerAction::Roll
        );
        assert_eq!(policy.decide(&model_with(0, 1)).action, PlayerAction::Idle);
    }

    #[test]
    fn monte_carlo_is_seed_deterministic() {
        let model = model_with(50_000, 1);
        let mut a = GameplayStrategy::MonteCarlo.create_policy(9);
        let mut b = GameplayStrategy::MonteCarlo.create_policy(9);
        for _ in 0..20 {
            assert_eq!(a.decide(&model).action, b.decide(&model).action);
        }
    }

    #[test]
    fn labels_are_distinct() {
        let labels: std::collections::HashSet<_> =
            GameplayStrategy::ALL.iter().map(|s| s.label()).collect();
        assert_eq!(labels.len(), GameplayStrategy::ALL.len());
    }
}
