//! Roll engine: single chain, lucky, multi and transcendent pipelines.
//!
//! The engine is a pure function of its modifiers, the combo/streak counters
//! it is handed and the random source. It never touches the progression state
//! directly; the model commits the returned [`RollOutcome`].
//!
//! Random draws happen in a fixed order per sub-roll: integer draws for the
//! base first, then unit draws for the critical check, the critical factor,
//! the super roll, the divine roll and finally streak protection. Scripted
//! sources rely on that order.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::constants::{
    CHAOS_STORM_MIN, CHAOS_STORM_SPAN, COMBO_BAD_THRESHOLD, COMBO_GOOD_THRESHOLD, COMBO_STEP,
    CRITICAL_BASE_CHANCE, CRITICAL_FACTOR_MIN, CRITICAL_FACTOR_SPAN, DIVINE_BLESSING_BASE,
    DIVINE_ROLL_CHANCE, DIVINE_ROLL_FACTOR, HIGH_RISK_BASE_CHANCE, HIGH_RISK_LOSS_FACTOR,
    HIGH_RISK_WIN_FACTOR, INFINITY_ROLL_DIVISOR, LUCKY_CRITICAL_CHANCE, LUCKY_CRITICAL_FACTOR_MIN,
    LUCKY_CRITICAL_FACTOR_SPAN, LUCKY_ROLL_ATTEMPTS, LUCKY_ROLL_CHANCE, MEGA_STREAK_THRESHOLD,
    METEOR_SHOWER_MAX, PRECISION_HIT_FACTOR, PRECISION_MISS_FACTOR, PRECISION_TARGET_MAX,
    STREAK_STEP, STREAK_THRESHOLD, SUPER_ROLL_CHANCE, SUPER_ROLL_FACTOR, TRANSCENDENT_CHANCE,
    WARP_BREAK_FACTOR, WARP_BREAK_THRESHOLD, WARP_MAJOR_FACTOR, WARP_MAJOR_THRESHOLD,
    WARP_MINOR_FACTOR, WARP_MINOR_THRESHOLD,
};
use crate::events::EventRollKind;
use crate::layers::Feature;
use crate::modifiers::RollModifiers;
use crate::numbers::{floor_f64_to_u64, u64_to_f64, usize_to_f64};
use crate::rng::RandomSource;

/// Display classification of a roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RollTag {
    Normal,
    Streak,
    Combo,
    Lucky,
    LuckyCritical,
    Critical,
    Super,
    Divine,
    Transcendent,
    ChallengeSuccess,
    ChallengeFail,
    PrecisionPerfect,
    PrecisionMiss,
    EnduranceBoost,
    MeteorShower,
    DivineBlessing,
    ChaosStorm,
}

impl RollTag {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Streak => "streak",
            Self::Combo => "combo",
            Self::Lucky => "lucky",
            Self::LuckyCritical => "lucky-critical",
            Self::Critical => "critical",
            Self::Super => "super",
            Self::Divine => "divine",
            Self::Transcendent => "transcendent",
            Self::ChallengeSuccess => "challenge-success",
            Self::ChallengeFail => "challenge-fail",
            Self::PrecisionPerfect => "precision-perfect",
            Self::PrecisionMiss => "precision-miss",
            Self::EnduranceBoost => "endurance-boost",
            Self::MeteorShower => "meteor-shower",
            Self::DivineBlessing => "divine-blessing",
            Self::ChaosStorm => "chaos-storm",
        }
    }

    /// Precedence among single-chain bonus tags; pipeline tags rank above all.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Streak => 1,
            Self::Combo => 2,
            Self::Lucky => 3,
            Self::LuckyCritical => 4,
            Self::Critical => 5,
            Self::Super => 6,
            Self::Divine => 7,
            _ => 8,
        }
    }

    /// Tags counted toward the critical rate.
    #[must_use]
    pub const fn is_critical(self) -> bool {
        matches!(self, Self::Critical | Self::LuckyCritical)
    }

    fn promote(&mut self, candidate: Self) {
        if candidate.rank() > self.rank() {
            *self = candidate;
        }
    }
}

/// All-or-nothing transform chosen by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChallengeMode {
    HighRisk,
    Precision,
    Endurance,
}

/// What triggered the roll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollSource {
    #[default]
    Manual,
    Auto,
}

/// Per-call roll options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollOptions {
    pub challenge: Option<ChallengeMode>,
    pub event: Option<EventRollKind>,
    pub source: RollSource,
    /// Wall-clock time of the roll, used by timing achievements.
    pub now_ms: Option<u64>,
}

impl RollOptions {
    #[must_use]
    pub fn manual() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn auto() -> Self {
        Self {
            source: RollSource::Auto,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_challenge(mut self, mode: ChallengeMode) -> Self {
        self.challenge = Some(mode);
        self
    }

    #[must_use]
    pub const fn with_event(mut self, kind: EventRollKind) -> Self {
        self.event = Some(kind);
        self
    }

    #[must_use]
    pub const fn at(mut self, now_ms: u64) -> Self {
        self.now_ms = Some(now_ms);
        self
    }
}

/// One pass through the single chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubRoll {
    pub base: u64,
    pub points: u64,
    pub tag: RollTag,
    pub critical: bool,
}

pub type SubRolls = SmallVec<[SubRoll; 5]>;

/// Which pipeline produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollKind {
    Single,
    Lucky,
    Multi,
    Transcendent,
}

/// Everything the caller needs to commit and display a roll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollOutcome {
    pub base: u64,
    pub final_points: u64,
    pub tag: RollTag,
    pub kind: RollKind,
    pub source: RollSource,
    pub sub_rolls: SubRolls,
    /// Critical, super or divine sub-rolls in this outcome.
    pub critical_hits: u32,
    pub combo: u32,
    pub streak: u32,
    pub challenge: Option<ChallengeMode>,
    pub event: Option<EventRollKind>,
}

/// Combo and streak counters threaded through consecutive sub-rolls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainCounters {
    pub combo: u32,
    pub streak: u32,
}

#[derive(Debug, Clone, Copy)]
struct CriticalProfile {
    chance: f64,
    factor_min: f64,
    factor_span: f64,
    tag: RollTag,
}

/// Stateless roll engine bound to one set of modifiers.
#[derive(Debug, Clone, Copy)]
pub struct RollEngine<'a> {
    modifiers: &'a RollModifiers,
}

impl<'a> RollEngine<'a> {
    #[must_use]
    pub const fn new(modifiers: &'a RollModifiers) -> Self {
        Self { modifiers }
    }

    /// Run the pipeline selected by the unlocked features, then apply the
    /// challenge, event and auto-roll transforms.
    pub fn roll<R: RandomSource + ?Sized>(
        &self,
        counters: &mut ChainCounters,
        options: &RollOptions,
        total_rolls: u64,
        rng: &mut R,
    ) -> RollOutcome {
        let m = self.modifiers;
        let mut outcome = if m.has(Feature::Transcendence) {
            self.transcendent(counters, total_rolls, rng)
        } else if m.has(Feature::MultiRoll) {
            self.multi(counters, rng)
        } else if m.has(Feature::LuckyRoll) && rng.unit() < LUCKY_ROLL_CHANCE + m.lucky_chance {
            self.lucky(counters, rng)
        } else {
            let sub = self.single(counters, rng);
            Self::outcome_from(RollKind::Single, u64_to_f64(sub.points), sub, SubRolls::from_elem(sub, 1))
        };

        if let Some(mode) = options.challenge.filter(|_| m.has(Feature::Challenge)) {
            self.apply_challenge(&mut outcome, mode, counters.streak, rng);
        }
        if let Some(kind) = options.event {
            self.apply_event_roll(&mut outcome, kind, rng);
        }
        if options.source == RollSource::Auto {
            outcome.final_points = floor_f64_to_u64(u64_to_f64(outcome.final_points) * m.auto_efficiency);
        }
        outcome.source = options.source;
        outcome.combo = counters.combo;
        outcome.streak = counters.streak;
        outcome
    }

    /// One pass through the single chain with the standard critical profile.
    pub fn single<R: RandomSource + ?Sized>(&self, counters: &mut ChainCounters, rng: &mut R) -> SubRoll {
        let base = self.draw_base(rng, false);
        self.chain(base, RollTag::Normal, self.standard_critical(), counters, rng)
    }

    /// Best-of-three base with a stronger critical profile.
    pub fn lucky<R: RandomSource + ?Sized>(&self, counters: &mut ChainCounters, rng: &mut R) -> RollOutcome {
        let m = self.modifiers;
        let mut base = m.range.min;
        for _ in 0..LUCKY_ROLL_ATTEMPTS {
            base = base.max(self.draw_base(rng, false));
        }
        let profile = CriticalProfile {
            chance: LUCKY_CRITICAL_CHANCE + m.critical_chance,
            factor_min: LUCKY_CRITICAL_FACTOR_MIN,
            factor_span: LUCKY_CRITICAL_FACTOR_SPAN,
            tag: RollTag::LuckyCritical,
        };
        let sub = self.chain(base, RollTag::Lucky, profile, counters, rng);
        Self::outcome_from(RollKind::Lucky, u64_to_f64(sub.points), sub, SubRolls::from_elem(sub, 1))
    }

    /// Several single chains summed and scaled by dice synergy.
    pub fn multi<R: RandomSource + ?Sized>(&self, counters: &mut ChainCounters, rng: &mut R) -> RollOutcome {
        let m = self.modifiers;
        let perfect = m.perfect_roll > 0.0 && rng.unit() < m.perfect_roll;
        let mut subs = SubRolls::new();
        for _ in 0..m.dice().max(1) {
            let base = self.draw_base(rng, perfect);
            subs.push(self.chain(base, RollTag::Normal, self.standard_critical(), counters, rng));
        }
        let sum = subs.iter().map(|sub| u64_to_f64(sub.points)).sum::<f64>();
        let best = subs
            .iter()
            .copied()
            .reduce(|best, sub| if sub.points > best.points { sub } else { best })
            .unwrap_or(SubRoll {
                base: m.range.min,
                points: 0,
                tag: RollTag::Normal,
                critical: false,
            });
        Self::outcome_from(RollKind::Multi, sum * m.dice_synergy, best, subs)
    }

    /// Multi-roll followed by the transcendent, reality-warp and infinity stages.
    pub fn transcendent<R: RandomSource + ?Sized>(
        &self,
        counters: &mut ChainCounters,
        total_rolls: u64,
        rng: &mut R,
    ) -> RollOutcome {
        let m = self.modifiers;
        let mut outcome = self.multi(counters, rng);
        outcome.kind = RollKind::Transcendent;
        let mut points = u64_to_f64(outcome.final_points);

        if rng.unit() < TRANSCENDENT_CHANCE {
            points *= usize_to_f64(m.layer_index + 1) * m.transcendence_power;
            outcome.tag = RollTag::Transcendent;
        }
        if m.has(Feature::RealityWarp) {
            let control = m.reality_control.clamp(0.0, 1.0);
            let warp = rng.unit() * (1.0 - control);
            let factor = if warp < WARP_BREAK_THRESHOLD {
                WARP_BREAK_FACTOR
            } else if warp < WARP_MAJOR_THRESHOLD {
                WARP_MAJOR_FACTOR
            } else if warp < WARP_MINOR_THRESHOLD || m.reality_anchor {
                WARP_MINOR_FACTOR
            } else {
                1.0
            };
            points *= factor;
        }
        if m.has(Feature::Infinity) {
            let growth = 1.0 + u64_to_f64(total_rolls) / INFINITY_ROLL_DIVISOR;
            points *= growth * m.infinity_engine;
        }
        outcome.final_points = floor_f64_to_u64(points);
        outcome
    }

    fn apply_challenge<R: RandomSource + ?Sized>(
        &self,
        outcome: &mut RollOutcome,
        mode: ChallengeMode,
        streak: u32,
        rng: &mut R,
    ) {
        let m = self.modifiers;
        let points = u64_to_f64(outcome.final_points);
        let (factor, tag) = match mode {
            ChallengeMode::HighRisk => {
                let win_chance = HIGH_RISK_BASE_CHANCE.mul_add(m.challenge_mastery, HIGH_RISK_BASE_CHANCE);
                if rng.unit() < win_chance {
                    (HIGH_RISK_WIN_FACTOR * m.challenge_rewards, RollTag::ChallengeSuccess)
                } else {
                    (HIGH_RISK_LOSS_FACTOR, RollTag::ChallengeFail)
                }
            }
            ChallengeMode::Precision => {
                let target = rng.uniform_int(1, PRECISION_TARGET_MAX);
                if outcome.base == target {
                    (PRECISION_HIT_FACTOR * m.challenge_rewards, RollTag::PrecisionPerfect)
                } else {
                    (PRECISION_MISS_FACTOR, RollTag::PrecisionMiss)
                }
            }
            ChallengeMode::Endurance => (f64::from(streak.max(1)), RollTag::EnduranceBoost),
        };
        outcome.final_points = floor_f64_to_u64(points * factor);
        outcome.tag = tag;
        outcome.challenge = Some(mode);
    }

    fn apply_event_roll<R: RandomSource + ?Sized>(
        &self,
        outcome: &mut RollOutcome,
        kind: EventRollKind,
        rng: &mut R,
    ) {
        let tier = usize_to_f64(self.modifiers.layer_index + 1);
        let points = u64_to_f64(outcome.final_points);
        let (total, tag) = match kind {
            EventRollKind::MeteorShower => {
                let bonus = u64_to_f64(rng.uniform_int(0, METEOR_SHOWER_MAX)) * tier;
                (points + bonus, RollTag::MeteorShower)
            }
            EventRollKind::DivineBlessing => (points * (DIVINE_BLESSING_BASE + tier), RollTag::DivineBlessing),
            EventRollKind::ChaosStorm => {
                let factor = rng.unit().mul_add(CHAOS_STORM_SPAN, CHAOS_STORM_MIN);
                (points * factor, RollTag::ChaosStorm)
            }
        };
        outcome.final_points = floor_f64_to_u64(total);
        outcome.tag = tag;
        outcome.event = Some(kind);
    }

    fn standard_critical(&self) -> CriticalProfile {
        CriticalProfile {
            chance: CRITICAL_BASE_CHANCE + self.modifiers.critical_chance,
            factor_min: CRITICAL_FACTOR_MIN,
            factor_span: CRITICAL_FACTOR_SPAN,
            tag: RollTag::Critical,
        }
    }

    fn draw_base<R: RandomSource + ?Sized>(&self, rng: &mut R, force_max: bool) -> u64 {
        let range = self.modifiers.range;
        if force_max || self.modifiers.omnipotence {
            range.max
        } else {
            rng.uniform_int(range.min, range.max)
        }
    }

    fn chain<R: RandomSource + ?Sized>(
        &self,
        base: u64,
        initial_tag: RollTag,
        critical: CriticalProfile,
        counters: &mut ChainCounters,
        rng: &mut R,
    ) -> SubRoll {
        let m = self.modifiers;
        let mut points = u64_to_f64(base) * m.total_multiplier;
        let mut tag = initial_tag;
        let mut critical_hit = false;

        if m.has(Feature::Critical) && rng.unit() < critical.chance {
            let factor = (rng.unit() * critical.factor_span).mul_add(m.critical_power, critical.factor_min);
            points *= factor;
            tag.promote(critical.tag);
            critical_hit = true;
        }
        if m.has(Feature::SuperRoll) || m.super_critical > 0.0 {
            let unlocked = if m.has(Feature::SuperRoll) { SUPER_ROLL_CHANCE } else { 0.0 };
            if rng.unit() < unlocked + m.super_critical {
                points *= SUPER_ROLL_FACTOR;
                tag.promote(RollTag::Super);
                critical_hit = true;
            }
        }
        if m.has(Feature::DivineRoll) && rng.unit() < DIVINE_ROLL_CHANCE {
            points *= DIVINE_ROLL_FACTOR;
            tag.promote(RollTag::Divine);
            critical_hit = true;
        }

        let position = m.range.position(base);
        if m.has(Feature::Combo) {
            let good = (COMBO_GOOD_THRESHOLD * (1.0 - m.combo_threshold)).max(COMBO_BAD_THRESHOLD);
            if position >= good {
                counters.combo = counters.combo.saturating_add(1);
                points *= (f64::from(counters.combo) * COMBO_STEP).mul_add(m.combo_power, 1.0);
                tag.promote(RollTag::Combo);
            } else if position < COMBO_BAD_THRESHOLD {
                counters.combo = 0;
            }
        }
        if m.has(Feature::Streak) {
            if position >= STREAK_THRESHOLD {
                counters.streak = counters.streak.saturating_add(1);
                let mut bonus = (f64::from(counters.streak) * STREAK_STEP).mul_add(m.streak_power, 1.0);
                if counters.streak >= MEGA_STREAK_THRESHOLD {
                    bonus *= m.mega_streak;
                }
                points *= bonus;
                tag.promote(RollTag::Streak);
            } else if !(m.streak_protection > 0.0 && rng.unit() < m.streak_protection) {
                counters.streak = 0;
            }
        }

        points *= m.event_multiplier;
        SubRoll {
            base,
            points: floor_f64_to_u64(points),
            tag,
            critical: critical_hit,
        }
    }

    fn outcome_from(kind: RollKind, total: f64, best: SubRoll, sub_rolls: SubRolls) -> RollOutcome {
        let critical_hits = u32::try_from(sub_rolls.iter().filter(|sub| sub.critical).count()).unwrap_or(u32::MAX);
        RollOutcome {
            base: best.base,
            final_points: floor_f64_to_u64(total),
            tag: best.tag,
            kind,
            source: RollSource::Manual,
            sub_rolls,
            critical_hits,
            combo: 0,
            streak: 0,
            challenge: None,
            event: None,
        }
    }
}
