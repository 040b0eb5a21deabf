//! CarPark — aggregate root for one physical facility.
//!
//! The aggregate owns every present [`Car`] (parked or not) and the set of
//! sensor topics it listens to. Occupancy figures are derived on demand and
//! never stored. Bays are a count, not addressable slots.
//!
//! Invariant: `parked_cars() <= total_bays()` for every state reachable
//! through this API, so `available_bays()` never underflows. More cars than
//! bays may be present; only the parked ones consume bays.

use crate::car::Car;
use crate::error::StateError;
use crate::snapshot::Snapshot;
use crate::time::{self, Timestamp};

/// One car park: bay capacity, last reading, last event and present cars.
#[derive(Debug, Clone)]
pub struct CarPark {
    total_bays: usize,
    temperature: Option<f64>,
    last_event: Option<Timestamp>,
    cars: Vec<Car>,
    sensor_topics: Vec<String>,
}

impl CarPark {
    /// Create an empty car park with a fixed number of bays.
    #[must_use]
    pub fn new(total_bays: usize) -> Self {
        Self {
            total_bays,
            temperature: None,
            last_event: None,
            cars: Vec::new(),
            sensor_topics: Vec::new(),
        }
    }

    #[must_use]
    pub fn total_bays(&self) -> usize {
        self.total_bays
    }

    /// Most recent temperature received from a sensor.
    #[must_use]
    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn set_temperature(&mut self, temperature: f64) {
        self.temperature = Some(temperature);
    }

    /// Time of the most recent entry or exit.
    #[must_use]
    pub fn last_event(&self) -> Option<Timestamp> {
        self.last_event
    }

    /// Stamp the last-event time with now if nothing has been recorded yet.
    ///
    /// Used when an exit signal arrives for an empty car park.
    pub fn touch_last_event(&mut self) {
        if self.last_event.is_none() {
            self.last_event = Some(time::now());
        }
    }

    #[must_use]
    pub fn sensor_topics(&self) -> &[String] {
        &self.sensor_topics
    }

    #[must_use]
    pub fn is_sensor_topic(&self, topic: &str) -> bool {
        self.sensor_topics.iter().any(|t| t == topic)
    }

    /// Add a sensor topic. Returns `false` (and changes nothing) when the
    /// topic is already registered.
    pub fn register_sensor_topic(&mut self, topic: impl Into<String>) -> bool {
        let topic = topic.into();
        if self.is_sensor_topic(&topic) {
            return false;
        }
        self.sensor_topics.push(topic);
        true
    }

    /// Remove a sensor topic. Returns `false` (and changes nothing) when the
    /// topic was not registered.
    pub fn unregister_sensor_topic(&mut self, topic: &str) -> bool {
        let before = self.sensor_topics.len();
        self.sensor_topics.retain(|t| t != topic);
        before != self.sensor_topics.len()
    }

    /// Let a car in: stamps its entry fields with the current temperature
    /// and records the entry time as the last event. The car is not parked.
    ///
    /// # Errors
    ///
    /// - [`StateError::TemperatureNotSet`] when no temperature was received yet.
    /// - [`StateError::DuplicatePlate`] when a car with the same plate is present.
    /// - [`StateError::AlreadyEntered`] when the car already carries entry fields.
    pub fn add_car(&mut self, mut car: Car) -> Result<(), StateError> {
        let temperature = self.require_temperature()?;
        if self.car(car.license_plate()).is_some() {
            return Err(StateError::DuplicatePlate {
                plate: car.license_plate().to_string(),
            });
        }
        car.enter(temperature)?;
        self.last_event = car.entry_time();
        self.cars.push(car);
        Ok(())
    }

    /// Let the car with `plate` out: unparks it, stamps its exit fields,
    /// records the exit time as the last event and hands the car back.
    ///
    /// Returns `Ok(None)` without touching anything when no such car is present.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::TemperatureNotSet`] when no temperature was
    /// received yet, even if the plate is absent.
    pub fn remove_car(&mut self, plate: &str) -> Result<Option<Car>, StateError> {
        let temperature = self.require_temperature()?;
        let Some(index) = self.position(plate) else {
            return Ok(None);
        };
        self.cars[index].exit(temperature)?;
        let car = self.cars.remove(index);
        self.last_event = car.exit_time();
        Ok(Some(car))
    }

    /// Park a present car. Parking an already-parked car is a no-op.
    ///
    /// # Errors
    ///
    /// - [`StateError::UnknownCar`] when no car with `plate` is present.
    /// - [`StateError::NoBayAvailable`] when every bay is taken.
    pub fn park_car(&mut self, plate: &str) -> Result<(), StateError> {
        let index = self.position(plate).ok_or_else(|| StateError::UnknownCar {
            plate: plate.to_string(),
        })?;
        if self.cars[index].is_parked() {
            return Ok(());
        }
        if self.available_bays() == 0 {
            return Err(StateError::NoBayAvailable);
        }
        self.cars[index].park();
        Ok(())
    }

    /// Unpark a present car, freeing its bay.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::UnknownCar`] when no car with `plate` is present.
    pub fn unpark_car(&mut self, plate: &str) -> Result<(), StateError> {
        let index = self.position(plate).ok_or_else(|| StateError::UnknownCar {
            plate: plate.to_string(),
        })?;
        self.cars[index].unpark();
        Ok(())
    }

    /// Look up a present car by plate.
    #[must_use]
    pub fn car(&self, plate: &str) -> Option<&Car> {
        self.cars.iter().find(|car| car.license_plate() == plate)
    }

    /// Every present car, in arrival order.
    #[must_use]
    pub fn cars(&self) -> &[Car] {
        &self.cars
    }

    pub fn parked(&self) -> impl Iterator<Item = &Car> {
        self.cars.iter().filter(|car| car.is_parked())
    }

    pub fn un_parked(&self) -> impl Iterator<Item = &Car> {
        self.cars.iter().filter(|car| !car.is_parked())
    }

    #[must_use]
    pub fn total_cars(&self) -> usize {
        self.cars.len()
    }

    #[must_use]
    pub fn parked_cars(&self) -> usize {
        self.parked().count()
    }

    #[must_use]
    pub fn un_parked_cars(&self) -> usize {
        self.un_parked().count()
    }

    #[must_use]
    pub fn available_bays(&self) -> usize {
        self.total_bays.saturating_sub(self.parked_cars())
    }

    /// The six-field occupancy summary for displays.
    ///
    /// # Errors
    ///
    /// - [`StateError::TemperatureNotSet`] when no temperature was received yet.
    /// - [`StateError::NoEventRecorded`] when no entry or exit happened yet.
    pub fn snapshot(&self) -> Result<Snapshot, StateError> {
        let temperature = self.require_temperature()?;
        let last_event = self.last_event.ok_or(StateError::NoEventRecorded)?;
        Ok(Snapshot {
            available_bays: self.available_bays(),
            temperature,
            last_event,
            total_cars: self.total_cars(),
            parked_cars: self.parked_cars(),
            un_parked_cars: self.un_parked_cars(),
        })
    }

    fn require_temperature(&self) -> Result<f64, StateError> {
        self.temperature.ok_or(StateError::TemperatureNotSet)
    }

    fn position(&self, plate: &str) -> Option<usize> {
        self.cars.iter().position(|car| car.license_plate() == plate)
    }
}
