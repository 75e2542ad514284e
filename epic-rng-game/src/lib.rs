//! Epic RNG progression engine
//!
//! Platform-agnostic core of the Epic RNG incremental roller: layers, the roll
//! engine, the upgrade catalog, prestige, achievements, a tick-driven
//! scheduler and snapshot persistence. The crate owns no clock and performs
//! no I/O beyond the [`KeyValueStore`] trait.

pub mod achievements;
pub mod constants;
pub mod events;
pub mod history;
pub mod layers;
pub mod model;
pub mod modifiers;
pub mod numbers;
pub mod rng;
pub mod roll;
pub mod save;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod upgrades;

// Re-export commonly used types
pub use achievements::{AchievementCatalog, AchievementContext, AchievementDef, AchievementRule};
pub use events::{ActiveEvents, EventRollKind, RandomEvent, TimedEvent, TimedEventKind};
pub use history::{HistoryEntry, RollHistory, RollStatistics};
pub use layers::{Feature, Layer, LayerCatalog, LayerCatalogError, RollRange};
pub use model::{
    LockReason, PrestigeSummary, ProgressionError, ProgressionModel, PurchaseReceipt,
    RebirthSummary,
};
pub use modifiers::{RollModifiers, derive_multiplier};
pub use rng::{CountingRng, RandomSource, RngBundle, ScriptedRng};
pub use roll::{
    ChainCounters, ChallengeMode, RollEngine, RollKind, RollOptions, RollOutcome, RollSource,
    RollTag, SubRoll, SubRolls,
};
pub use save::{
    LoadSource, LoadedGame, MemoryStore, MemoryStoreError, PersistenceError, SaveInfo, SaveKind,
    SaveManager, SaveSnapshot, SaveStatistics,
};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerConfigError, SchedulerEvent};
pub use session::GameSession;
pub use state::ProgressionState;
pub use upgrades::{
    EffectSpec, EffectValue, UnknownUpgradeId, UpgradeCatalog, UpgradeCategory, UpgradeDef,
    UpgradeId, UpgradeLevels,
};

/// String key-value storage the save system writes to.
/// Platform-specific implementations should provide this
pub trait KeyValueStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, Self::Error>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), Self::Error>;

    /// Delete `key` if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be removed.
    fn remove(&self, key: &str) -> Result<(), Self::Error>;
}

/// What a clock advance did to the session and its saves.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub events: Vec<SchedulerEvent>,
    pub autosaved: bool,
    /// Message of an autosave that failed; the session keeps running.
    pub save_failure: Option<String>,
}

/// Main game engine tying sessions to persistent storage
pub struct GameEngine<S>
where
    S: KeyValueStore,
{
    saves: SaveManager<S>,
    config: SchedulerConfig,
}

impl<S> GameEngine<S>
where
    S: KeyValueStore,
{
    /// Create a new engine over the provided storage with default timers
    pub fn new(storage: S) -> Self {
        Self {
            saves: SaveManager::new(storage),
            config: SchedulerConfig::default(),
        }
    }

    /// Create an engine with custom scheduler settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the config fails validation.
    pub fn with_config(storage: S, config: SchedulerConfig) -> Result<Self, SchedulerConfigError> {
        config.validate()?;
        Ok(Self {
            saves: SaveManager::new(storage),
            config,
        })
    }

    pub const fn saves(&self) -> &SaveManager<S> {
        &self.saves
    }

    /// Load the stored game (or defaults) into a new session.
    pub fn open_session(&mut self, seed: u64, now_ms: u64) -> (GameSession, LoadSource) {
        let loaded = self.saves.load(now_ms);
        let scheduler = Scheduler::new(self.config.clone()).unwrap_or_default();
        (
            GameSession::new(loaded.model, scheduler, seed, now_ms),
            loaded.source,
        )
    }

    /// Advance the session clock and autosave when the scheduler asks.
    pub fn advance(&mut self, session: &mut GameSession, elapsed_ms: u64) -> TickReport {
        let events = session.advance(elapsed_ms);
        let mut report = TickReport {
            autosaved: false,
            save_failure: None,
            events,
        };
        if report.events.contains(&SchedulerEvent::AutoSaveDue) {
            match self.saves.save(session.model(), SaveKind::Auto, session.clock_ms()) {
                Ok(_) => report.autosaved = true,
                Err(err) => {
                    log::warn!("autosave failed: {err}");
                    report.save_failure = Some(err.to_string());
                }
            }
        }
        report
    }

    /// Manual save to the main and backup slots.
    ///
    /// # Errors
    ///
    /// Returns the persistence failure for the caller to report.
    pub fn save_now(&mut self, session: &GameSession) -> Result<usize, PersistenceError> {
        self.saves.save(session.model(), SaveKind::Manual, session.clock_ms())
    }

    /// Wipe every save slot and reset the session.
    ///
    /// # Errors
    ///
    /// Returns the persistence failure; the session is reset regardless.
    pub fn reset(&mut self, session: &mut GameSession) -> Result<(), PersistenceError> {
        session.reset();
        self.saves.clear_all()
    }

    /// Export the session as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn export(&self, session: &GameSession) -> Result<String, PersistenceError> {
        self.saves.export_text(session.model(), session.clock_ms())
    }

    /// Replace the session's model with an imported snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error and leaves the session untouched if the text is invalid.
    pub fn import(&mut self, session: &mut GameSession, text: &str) -> Result<(), PersistenceError> {
        let model = self.saves.import_text(text)?;
        let scheduler = session.scheduler().clone();
        *session = GameSession::new(model, scheduler, session.seed(), session.clock_ms());
        Ok(())
    }
}
