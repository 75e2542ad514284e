use epic_rng_game::{
    Feature, GameEngine, GameSession, KeyValueStore, LayerCatalog, LoadSource, MemoryStore,
    ProgressionModel, RollOptions, SaveKind, SaveManager, UpgradeId,
};
use serde_json::json;
use std::cell::RefCell;
use std::collections::HashMap;
use std::convert::Infallible;
use std::rc::Rc;

fn played_session(seed: u64, rolls: usize) -> GameSession {
    let mut session = GameSession::fresh(seed);
    for _ in 0..rolls {
        session.roll(RollOptions::manual());
        if session.model().can_rebirth() {
            session.rebirth();
        }
        if session.model().can_afford_upgrade(UpgradeId::ClickPower) {
            session.purchase(UpgradeId::ClickPower).unwrap();
        }
    }
    session
}

#[test]
fn out_of_range_layer_snapshot_falls_back_to_defaults() {
    let store = MemoryStore::new();
    let snapshot = json!({
        "version": "1.0.0",
        "timestamp": 10,
        "state": {
            "points": 500,
            "current_layer_index": 99,
            "multiplier": 1.0,
            "total_rolls": 3
        }
    });
    store.insert_raw("epicRngGameSave", &snapshot.to_string());
    let loaded = SaveManager::new(store).load(0);
    assert_eq!(loaded.source, LoadSource::Defaults);
    assert_eq!(loaded.model.state(), ProgressionModel::new().state());
}

#[test]
fn reachable_states_survive_a_save_cycle() {
    for seed in [5_u64, 11, 2024] {
        let session = played_session(seed, 500);
        let store = MemoryStore::new();
        let mut manager = SaveManager::new(store.clone());
        manager.save(session.model(), SaveKind::Manual, 1).unwrap();
        let loaded = SaveManager::new(store).load(2);
        assert_eq!(loaded.source, LoadSource::Main);
        assert_eq!(loaded.model.state(), session.model().state());
    }
}

#[test]
fn persisted_multiplier_is_never_trusted() {
    let store = MemoryStore::new();
    let snapshot = json!({
        "version": "1.0.0",
        "timestamp": 10,
        "state": {
            "points": 12,
            "current_layer_index": 2,
            "multiplier": 1e9,
            "total_rolls": 40,
            "upgrades": {"point_multiplier": 2}
        }
    });
    store.insert_raw("epicRngGameSave", &snapshot.to_string());
    let loaded = SaveManager::new(store).load(0);
    assert_eq!(loaded.source, LoadSource::Main);
    assert!((loaded.model.state().multiplier - 9.0).abs() < 1e-9);
    assert_eq!(loaded.model.state().total_rolls, 40);
}

#[test]
fn stale_feature_names_do_not_discard_the_save() {
    let store = MemoryStore::new();
    let snapshot = json!({
        "version": "1.0.0",
        "timestamp": 10,
        "state": {
            "points": 777,
            "current_layer_index": 2,
            "multiplier": 1.0,
            "total_rolls": 5,
            "unlocked_features": ["combo", "hyper_mode"]
        }
    });
    store.insert_raw("epicRngGameSave", &snapshot.to_string());
    let loaded = SaveManager::new(store).load(0);
    assert_eq!(loaded.source, LoadSource::Main);
    let state = loaded.model.state();
    assert_eq!(state.points, 777);
    assert_eq!(state.current_layer_index, 2);
    assert_eq!(state.total_rolls, 5);
    assert_eq!(state.unlocked_features, LayerCatalog::load_from_static().features_through(2));
    assert!(state.has_feature(Feature::Combo));
    assert!(state.has_feature(Feature::AutoRoll));
    assert!((state.multiplier - 6.0).abs() < 1e-9);
}

#[test]
fn wrong_typed_optional_field_rejects_whole_snapshot() {
    let store = MemoryStore::new();
    let snapshot = json!({
        "version": "1.0.0",
        "state": {
            "points": 12,
            "current_layer_index": 0,
            "multiplier": 1.0,
            "total_rolls": 1,
            "combo": "lots"
        }
    });
    store.insert_raw("epicRngGameSave", &snapshot.to_string());
    let loaded = SaveManager::new(store).load(0);
    assert_eq!(loaded.source, LoadSource::Defaults);
}

#[derive(Clone, Default)]
struct SharedMapStore {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl KeyValueStore for SharedMapStore {
    type Error = Infallible;

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

#[test]
fn engine_works_over_any_store() {
    let store = SharedMapStore::default();
    let mut engine = GameEngine::new(store.clone());
    let (mut session, source) = engine.open_session(77, 0);
    assert_eq!(source, LoadSource::Defaults);
    for _ in 0..12 {
        session.roll(RollOptions::manual());
    }
    let mut autosaves = 0;
    for _ in 0..4 {
        if engine.advance(&mut session, 15_000).autosaved {
            autosaves += 1;
        }
    }
    assert_eq!(autosaves, 2);
    assert!(store.entries.borrow().contains_key("epicRngGameSave"));
    assert!(!store.entries.borrow().contains_key("epicRngGameSave_backup"));

    engine.save_now(&session).unwrap();
    assert!(store.entries.borrow().contains_key("epicRngGameSave_backup"));

    engine.reset(&mut session).unwrap();
    assert!(store.entries.borrow().is_empty());
    assert_eq!(session.model().state().total_rolls, 0);
}
