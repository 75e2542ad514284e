//! Randomness sources feeding the roll engine and the scheduler.
use hmac::{Hmac, Mac};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use sha2::Sha256;
use std::cell::{RefCell, RefMut};
use std::collections::VecDeque;

/// Minimal randomness contract used by every probabilistic rule in the crate.
pub trait RandomSource {
    /// Uniform integer in `[min, max]`. Reversed bounds are swapped.
    fn uniform_int(&mut self, min: u64, max: u64) -> u64;

    /// Uniform float in `[0, 1)`.
    fn unit(&mut self) -> f64;
}

impl<R: rand::RngCore> RandomSource for R {
    fn uniform_int(&mut self, min: u64, max: u64) -> u64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        self.gen_range(lo..=hi)
    }

    fn unit(&mut self) -> f64 {
        self.r#gen::<f64>()
    }
}

/// Deterministic bundle of RNG streams segregated by domain.
#[derive(Debug, Clone)]
pub struct RngBundle {
    seed: u64,
    roll: RefCell<CountingRng<SmallRng>>,
    auto: RefCell<CountingRng<SmallRng>>,
    events: RefCell<CountingRng<SmallRng>>,
}

impl RngBundle {
    /// Construct the bundle from a user-visible seed.
    #[must_use]
    pub fn from_user_seed(seed: u64) -> Self {
        Self {
            seed,
            roll: RefCell::new(CountingRng::new(derive_stream_seed(seed, b"roll"))),
            auto: RefCell::new(CountingRng::new(derive_stream_seed(seed, b"auto"))),
            events: RefCell::new(CountingRng::new(derive_stream_seed(seed, b"events"))),
        }
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Stream used by player-initiated rolls.
    #[must_use]
    pub fn roll(&self) -> RefMut<'_, CountingRng<SmallRng>> {
        self.roll.borrow_mut()
    }

    /// Stream used by scheduler auto-rolls.
    #[must_use]
    pub fn auto(&self) -> RefMut<'_, CountingRng<SmallRng>> {
        self.auto.borrow_mut()
    }

    /// Stream used by the random-event timer.
    #[must_use]
    pub fn events(&self) -> RefMut<'_, CountingRng<SmallRng>> {
        self.events.borrow_mut()
    }

    /// Total draws across every stream.
    #[must_use]
    pub fn total_draws(&self) -> u64 {
        self.roll
            .borrow()
            .draws()
            .saturating_add(self.auto.borrow().draws())
            .saturating_add(self.events.borrow().draws())
    }
}

/// Counting wrapper for RNG streams providing instrumentation.
#[derive(Debug, Clone)]
pub struct CountingRng<R> {
    rng: R,
    draws: u64,
}

impl CountingRng<SmallRng> {
    fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            draws: 0,
        }
    }
}

impl<R: rand::RngCore> CountingRng<R> {
    /// Number of draw calls performed against this stream.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl<R: rand::RngCore> rand::RngCore for CountingRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.saturating_add(1);
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.draws = self.draws.saturating_add(1);
        self.rng.try_fill_bytes(dest)
    }
}

fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()) else {
        return user_seed;
    };
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0_u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}

/// Replays queued values so tests and tools can pin exact roll outcomes.
///
/// Integer draws pop from the integer queue and are clamped into the requested
/// range; once it is empty they return the lower bound. Unit draws pop from the
/// unit queue; once it is empty they return `fallback_unit`, which defaults to a
/// value high enough that no chance-based bonus triggers.
#[derive(Debug, Clone)]
pub struct ScriptedRng {
    ints: VecDeque<u64>,
    units: VecDeque<f64>,
    fallback_unit: f64,
}

impl Default for ScriptedRng {
    fn default() -> Self {
        Self {
            ints: VecDeque::new(),
            units: VecDeque::new(),
            fallback_unit: 0.999,
        }
    }
}

impl ScriptedRng {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_ints(mut self, ints: impl IntoIterator<Item = u64>) -> Self {
        self.ints.extend(ints);
        self
    }

    #[must_use]
    pub fn with_units(mut self, units: impl IntoIterator<Item = f64>) -> Self {
        self.units.extend(units);
        self
    }

    #[must_use]
    pub fn with_fallback_unit(mut self, fallback: f64) -> Self {
        self.fallback_unit = fallback.clamp(0.0, 0.999_999);
        self
    }

    pub fn push_int(&mut self, value: u64) {
        self.ints.push_back(value);
    }

    pub fn push_unit(&mut self, value: f64) {
        self.units.push_back(value);
    }

    /// Queued values not yet consumed, as `(ints, units)`.
    #[must_use]
    pub fn remaining(&self) -> (usize, usize) {
        (self.ints.len(), self.units.len())
    }
}

impl RandomSource for ScriptedRng {
    fn uniform_int(&mut self, min: u64, max: u64) -> u64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        self.ints.pop_front().map_or(lo, |value| value.clamp(lo, hi))
    }

    fn unit(&mut self) -> f64 {
        self.units
            .pop_front()
            .map_or(self.fallback_unit, |value| value.clamp(0.0, 0.999_999))
    }
}
