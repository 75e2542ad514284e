//! Centralized balance and tuning constants for the Epic RNG progression model.
//!
//! These values define the deterministic math for rolls, bonuses, prestige
//! and persistence. Catalog rows (layers, upgrades, achievements) live in the
//! embedded JSON data files; everything that is a formula constant lives here.

// Critical hits --------------------------------------------------------------
pub(crate) const CRITICAL_BASE_CHANCE: f64 = 0.15;
pub(crate) const CRITICAL_FACTOR_MIN: f64 = 2.0;
pub(crate) const CRITICAL_FACTOR_SPAN: f64 = 3.0;

// Super and divine rolls -----------------------------------------------------
pub(crate) const SUPER_ROLL_CHANCE: f64 = 0.05;
pub(crate) const SUPER_ROLL_FACTOR: f64 = 10.0;
pub(crate) const DIVINE_ROLL_CHANCE: f64 = 0.01;
pub(crate) const DIVINE_ROLL_FACTOR: f64 = 50.0;

// Combo and streak -----------------------------------------------------------
pub(crate) const COMBO_GOOD_THRESHOLD: f64 = 0.7;
pub(crate) const COMBO_BAD_THRESHOLD: f64 = 0.3;
pub(crate) const COMBO_STEP: f64 = 0.1;
pub(crate) const STREAK_THRESHOLD: f64 = 0.6;
pub(crate) const STREAK_STEP: f64 = 0.05;
pub(crate) const MEGA_STREAK_THRESHOLD: u32 = 25;

// Lucky rolls ----------------------------------------------------------------
pub(crate) const LUCKY_ROLL_CHANCE: f64 = 0.2;
pub(crate) const LUCKY_ROLL_ATTEMPTS: u32 = 3;
pub(crate) const LUCKY_CRITICAL_CHANCE: f64 = 0.25;
pub(crate) const LUCKY_CRITICAL_FACTOR_MIN: f64 = 3.0;
pub(crate) const LUCKY_CRITICAL_FACTOR_SPAN: f64 = 4.0;

// Late-layer pipelines -------------------------------------------------------
pub(crate) const TRANSCENDENT_CHANCE: f64 = 0.1;
pub(crate) const WARP_BREAK_THRESHOLD: f64 = 0.05;
pub(crate) const WARP_BREAK_FACTOR: f64 = 100.0;
pub(crate) const WARP_MAJOR_THRESHOLD: f64 = 0.15;
pub(crate) const WARP_MAJOR_FACTOR: f64 = 10.0;
pub(crate) const WARP_MINOR_THRESHOLD: f64 = 0.3;
pub(crate) const WARP_MINOR_FACTOR: f64 = 3.0;
pub(crate) const INFINITY_ROLL_DIVISOR: f64 = 10_000.0;

// Challenge modes ------------------------------------------------------------
pub(crate) const HIGH_RISK_BASE_CHANCE: f64 = 0.5;
pub(crate) const HIGH_RISK_WIN_FACTOR: f64 = 10.0;
pub(crate) const HIGH_RISK_LOSS_FACTOR: f64 = 0.1;
pub(crate) const PRECISION_TARGET_MAX: u64 = 20;
pub(crate) const PRECISION_HIT_FACTOR: f64 = 50.0;
pub(crate) const PRECISION_MISS_FACTOR: f64 = 0.5;

// Event rolls ----------------------------------------------------------------
pub(crate) const METEOR_SHOWER_MAX: u64 = 999;
pub(crate) const DIVINE_BLESSING_BASE: f64 = 5.0;
pub(crate) const CHAOS_STORM_MIN: f64 = 0.1;
pub(crate) const CHAOS_STORM_SPAN: f64 = 19.9;

// Timed events ---------------------------------------------------------------
pub(crate) const LUCKY_STREAK_FACTOR: f64 = 2.0;
pub(crate) const LUCKY_STREAK_DURATION_MS: u64 = 30_000;
pub(crate) const PRESTIGE_INVESTMENT_FACTOR: f64 = 10.0;
pub(crate) const PRESTIGE_INVESTMENT_DURATION_MS: u64 = 60_000;
pub(crate) const PRESTIGE_INVESTMENT_COST: f64 = 10.0;

// Prestige -------------------------------------------------------------------
pub(crate) const PRESTIGE_BASE_REQUIREMENT: f64 = 1e13;
pub(crate) const PRESTIGE_BONUS_PER_LEVEL: f64 = 0.1;

// Scheduler defaults ---------------------------------------------------------
pub(crate) const AUTO_ROLL_DEFAULT_INTERVAL_MS: u64 = 1_000;
pub(crate) const AUTOSAVE_INTERVAL_MS: u64 = 30_000;
pub(crate) const EVENT_CHECK_INTERVAL_MS: u64 = 45_000;
pub(crate) const RANDOM_EVENT_CHANCE: f64 = 0.1;
pub(crate) const MAX_CATCH_UP_ROLLS: u32 = 50;

// History and persistence ----------------------------------------------------
pub(crate) const HISTORY_CAPACITY: usize = 100;
pub(crate) const SAVED_HISTORY_LEN: usize = 50;
pub(crate) const SAVE_KEY: &str = "epicRngGameSave";
pub(crate) const BACKUP_SUFFIX: &str = "_backup";
pub(crate) const STATISTICS_SUFFIX: &str = "_statistics";
pub(crate) const SAVE_VERSION: &str = "1.0.0";
