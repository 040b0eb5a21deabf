//! ParkingPolicy — decides which car takes a free bay and which car leaves.
//!
//! The policy is a value held by whoever drives the aggregate. Its RNG is a
//! [`ChaCha8Rng`] so a fixed seed replays the exact same simulation.

use rand::seq::{IteratorRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;

use crate::car::Car;
use crate::carpark::CarPark;
use crate::error::StateError;

/// Models used when none are configured.
pub const DEFAULT_CAR_MODELS: [&str; 3] = ["ModelA", "ModelB", "ModelC"];

/// Upper bound on plate re-draws before giving up on a collision.
const MAX_PLATE_DRAWS: usize = 32;

/// How a car is picked when several are eligible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Uniformly at random among every eligible car.
    #[default]
    UniformRandom,
    /// The car that arrived first.
    Fifo,
}

/// Entry/exit strategy for a simulated car park.
#[derive(Debug, Clone)]
pub struct ParkingPolicy {
    rng: ChaCha8Rng,
    car_models: Vec<String>,
    tie_break: TieBreak,
}

impl ParkingPolicy {
    /// Policy seeded from OS entropy.
    #[must_use]
    pub fn new(car_models: Vec<String>) -> Self {
        Self::with_rng(ChaCha8Rng::from_entropy(), car_models)
    }

    /// Reproducible policy: the same seed yields the same cars and choices.
    #[must_use]
    pub fn seeded(seed: u64, car_models: Vec<String>) -> Self {
        Self::with_rng(ChaCha8Rng::seed_from_u64(seed), car_models)
    }

    fn with_rng(rng: ChaCha8Rng, car_models: Vec<String>) -> Self {
        let car_models = if car_models.is_empty() {
            DEFAULT_CAR_MODELS.iter().map(ToString::to_string).collect()
        } else {
            car_models
        };
        Self {
            rng,
            car_models,
            tie_break: TieBreak::default(),
        }
    }

    #[must_use]
    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    #[must_use]
    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    #[must_use]
    pub fn car_models(&self) -> &[String] {
        &self.car_models
    }

    /// A vehicle entered: add a fresh car un-parked, then hand a free bay
    /// (if any) to one of the un-parked cars.
    ///
    /// Returns a copy of the car that entered.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::TemperatureNotSet`] when the car park has no
    /// temperature yet; the car park is left untouched.
    pub fn on_entry_signal(&mut self, park: &mut CarPark) -> Result<Car, StateError> {
        let car = self.fresh_car(park);
        let entered = car.license_plate().to_string();
        park.add_car(car)?;

        if park.available_bays() > 0 {
            let chosen = match self.tie_break {
                TieBreak::UniformRandom => park.un_parked().choose(&mut self.rng),
                TieBreak::Fifo => park.un_parked().next(),
            }
            .map(|car| car.license_plate().to_string());
            if let Some(plate) = chosen {
                park.park_car(&plate)?;
            }
        }

        park.car(&entered)
            .cloned()
            .ok_or(StateError::UnknownCar { plate: entered })
    }

    /// A vehicle exited: pick one present car (parked or not) and let it out.
    ///
    /// On an empty car park nothing leaves, but the last-event time is
    /// initialised if it was never set.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::TemperatureNotSet`] when the car park has no
    /// temperature yet, even when it is empty.
    pub fn on_exit_signal(&mut self, park: &mut CarPark) -> Result<Option<Car>, StateError> {
        if park.temperature().is_none() {
            return Err(StateError::TemperatureNotSet);
        }

        let chosen = match self.tie_break {
            TieBreak::UniformRandom => park.cars().choose(&mut self.rng),
            TieBreak::Fifo => park.cars().first(),
        }
        .map(|car| car.license_plate().to_string());

        match chosen {
            Some(plate) => park.remove_car(&plate),
            None => {
                park.touch_last_event();
                Ok(None)
            }
        }
    }

    /// Draw a car whose plate is not already present.
    fn fresh_car(&mut self, park: &CarPark) -> Car {
        let mut car = Car::random(&mut self.rng, &self.car_models);
        for _ in 1..MAX_PLATE_DRAWS {
            if park.car(car.license_plate()).is_none() {
                break;
            }
            car = Car::random(&mut self.rng, &self.car_models);
        }
        car
    }

    /// Random temperature in `[lower, upper]`, used by simulations that
    /// drive the policy directly.
    pub fn temperature(&mut self, lower: i32, upper: i32) -> f64 {
        let (lower, upper) = if lower <= upper {
            (lower, upper)
        } else {
            (upper, lower)
        };
        f64::from(self.rng.gen_range(lower..=upper))
    }
}

impl Default for ParkingPolicy {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
