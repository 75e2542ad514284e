//! Rebirth layer catalog: roll ranges, multipliers and feature unlocks.
//!
//! Layers are indexed from 0 (`Novice`) to 10 (`Omnipotent`). The catalog is
//! compiled into the crate from `data/layers.json` and validated on first use.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_LAYER_DATA: &str = include_str!("../data/layers.json");

/// Gameplay feature unlocked by reaching a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    AutoRoll,
    Combo,
    LuckyRoll,
    Critical,
    Streak,
    MultiRoll,
    SuperRoll,
    Challenge,
    DivineRoll,
    Transcendence,
    RealityWarp,
    Infinity,
}

/// Inclusive range of base roll values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollRange {
    pub min: u64,
    pub max: u64,
}

impl RollRange {
    #[must_use]
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    /// Relative position of `value` inside the range, in `[0, 1]`.
    ///
    /// A degenerate range (`min == max`) reports every value as the top.
    #[must_use]
    pub fn position(&self, value: u64) -> f64 {
        if self.max <= self.min {
            return 1.0;
        }
        let offset = value.clamp(self.min, self.max) - self.min;
        crate::numbers::u64_to_f64(offset) / crate::numbers::u64_to_f64(self.max - self.min)
    }

    #[must_use]
    pub const fn contains(&self, value: u64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// A single rebirth tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub index: usize,
    pub name: String,
    /// Points required to rebirth into this layer.
    pub point_requirement: u64,
    pub multiplier: f64,
    pub roll_range: RollRange,
    /// Dice thrown per multi-roll at this tier.
    #[serde(default = "Layer::default_roll_count")]
    pub roll_count: u32,
    #[serde(default)]
    pub unlocked_features: Vec<Feature>,
}

impl Layer {
    const fn default_roll_count() -> u32 {
        1
    }
}

/// Validation failures for layer catalogs.
#[derive(Debug, Error, PartialEq)]
pub enum LayerCatalogError {
    #[error("layer catalog must contain at least one layer")]
    Empty,
    #[error("layer at position {position} declares index {index}")]
    IndexMismatch { position: usize, index: usize },
    #[error("layer {index} has an inverted roll range {min}..={max}")]
    InvertedRange { index: usize, min: u64, max: u64 },
    #[error("layer {index} must raise both the point requirement and the multiplier")]
    NotIncreasing { index: usize },
    #[error("layer {index} has a non-positive multiplier {multiplier}")]
    InvalidMultiplier { index: usize, multiplier: f64 },
}

#[derive(Debug, Deserialize)]
struct LayerFile {
    layers: Vec<Layer>,
}

/// Ordered, validated, never-empty sequence of layers.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerCatalog {
    layers: Vec<Layer>,
}

impl LayerCatalog {
    /// Build a catalog, checking ordering and range invariants.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty, indices are not contiguous from
    /// zero, a range is inverted, or requirements/multipliers do not strictly
    /// increase.
    pub fn new(layers: Vec<Layer>) -> Result<Self, LayerCatalogError> {
        if layers.is_empty() {
            return Err(LayerCatalogError::Empty);
        }
        for (position, layer) in layers.iter().enumerate() {
            if layer.index != position {
                return Err(LayerCatalogError::IndexMismatch {
                    position,
                    index: layer.index,
                });
            }
            if layer.roll_range.min > layer.roll_range.max {
                return Err(LayerCatalogError::InvertedRange {
                    index: layer.index,
                    min: layer.roll_range.min,
                    max: layer.roll_range.max,
                });
            }
            if !(layer.multiplier.is_finite() && layer.multiplier > 0.0) {
                return Err(LayerCatalogError::InvalidMultiplier {
                    index: layer.index,
                    multiplier: layer.multiplier,
                });
            }
        }
        for pair in layers.windows(2) {
            let [previous, next] = pair else { continue };
            if next.point_requirement <= previous.point_requirement
                || next.multiplier <= previous.multiplier
            {
                return Err(LayerCatalogError::NotIncreasing { index: next.index });
            }
        }
        Ok(Self { layers })
    }

    /// Parse and validate the embedded layer data, falling back to a
    /// single-layer catalog if the data is unusable.
    #[must_use]
    pub fn load_from_static() -> Self {
        match Self::from_json(DEFAULT_LAYER_DATA) {
            Ok(catalog) => catalog,
            Err(err) => {
                log::warn!("embedded layer catalog rejected: {err}");
                Self::default()
            }
        }
    }

    /// Parse a catalog from JSON text shaped like `data/layers.json`.
    ///
    /// # Errors
    ///
    /// Returns a message describing either the parse or the validation failure.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let file: LayerFile = serde_json::from_str(json).map_err(|err| err.to_string())?;
        Self::new(file.layers).map_err(|err| err.to_string())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    #[must_use]
    pub fn max_index(&self) -> usize {
        self.layers.len().saturating_sub(1)
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    /// Layer at `index`, clamped to the last layer.
    #[must_use]
    pub fn layer(&self, index: usize) -> &Layer {
        let clamped = index.min(self.max_index());
        &self.layers[clamped]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    /// Union of every feature unlocked by layers `0..=index`.
    #[must_use]
    pub fn features_through(&self, index: usize) -> BTreeSet<Feature> {
        self.layers
            .iter()
            .take(index.saturating_add(1))
            .flat_map(|layer| layer.unlocked_features.iter().copied())
            .collect()
    }

    /// First layer that unlocks `feature`, if any.
    #[must_use]
    pub fn unlock_layer(&self, feature: Feature) -> Option<usize> {
        self.layers
            .iter()
            .find(|layer| layer.unlocked_features.contains(&feature))
            .map(|layer| layer.index)
    }

    /// Product of layer multipliers for `0..=index`.
    #[must_use]
    pub fn cumulative_multiplier(&self, index: usize) -> f64 {
        self.layers
            .iter()
            .take(index.saturating_add(1))
            .map(|layer| layer.multiplier)
            .product()
    }
}

impl Default for LayerCatalog {
    fn default() -> Self {
        Self {
            layers: vec![Layer {
                index: 0,
                name: "Novice".to_string(),
                point_requirement: 0,
                multiplier: 1.0,
                roll_range: RollRange::new(1, 6),
                roll_count: 1,
                unlocked_features: Vec::new(),
            }],
        }
    }
}

#[must_use]
pub fn catalog() -> &'static LayerCatalog {
    static CATALOG: OnceLock<LayerCatalog> = OnceLock::new();
    CATALOG.get_or_init(LayerCatalog::load_from_static)
}
