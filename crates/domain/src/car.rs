//! Car — one vehicle's presence window inside a car park.
//!
//! Entry fields are written exactly once by [`Car::enter`], exit fields
//! exactly once by [`Car::exit`] and only after entry. The `parked` flag is
//! unconstrained at this level: the bay invariant is enforced by
//! [`CarPark`](crate::carpark::CarPark), not by the car.
//!
//! Two interchangeable record layouts are provided for persistence and
//! logging: a keyed JSON form and a fixed-order comma-delimited form. Unset
//! optional fields are written as an explicit `null` in both.

use std::fmt;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, StateError};
use crate::time::{self, Timestamp};

/// Plate templates: `L` is replaced by a letter, `N` by a digit, anything
/// else is kept verbatim.
pub const PLATE_TEMPLATES: [&str; 6] = [
    "LLL-NNN",
    "NLL-NNN",
    "NLLL-NNN",
    "LL-NNNN",
    "TAXI-NNNN",
    "LLL-NNNN",
];

const PLATE_LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const PLATE_DIGITS: &[u8] = b"0123456789";

/// Sentinel written in the delimited form for an unset optional field.
pub const NULL_SENTINEL: &str = "null";

/// Field separator of the delimited form. Plates and models must not contain it.
pub const CSV_DELIMITER: char = ',';

const CSV_FIELDS: usize = 7;

/// One vehicle's presence record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Car {
    license_plate: String,
    car_model: String,
    #[serde(with = "time::optional_timestamp")]
    entry_time: Option<Timestamp>,
    #[serde(with = "time::optional_timestamp")]
    exit_time: Option<Timestamp>,
    #[serde(deserialize_with = "Option::deserialize")]
    entry_temperature: Option<f64>,
    #[serde(deserialize_with = "Option::deserialize")]
    exit_temperature: Option<f64>,
    is_parked: bool,
}

impl Car {
    /// Create a car that has not entered yet and is not parked.
    #[must_use]
    pub fn new(license_plate: impl Into<String>, car_model: impl Into<String>) -> Self {
        Self {
            license_plate: license_plate.into(),
            car_model: car_model.into(),
            entry_time: None,
            exit_time: None,
            entry_temperature: None,
            exit_temperature: None,
            is_parked: false,
        }
    }

    /// Generate a car with a random plate and a model drawn from `models`.
    ///
    /// The model is left empty when `models` is empty.
    #[must_use]
    pub fn random<R: Rng + ?Sized>(rng: &mut R, models: &[String]) -> Self {
        let plate = random_plate(rng);
        let model = models.choose(rng).cloned().unwrap_or_default();
        Self::new(plate, model)
    }

    #[must_use]
    pub fn license_plate(&self) -> &str {
        &self.license_plate
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.car_model
    }

    #[must_use]
    pub fn entry_time(&self) -> Option<Timestamp> {
        self.entry_time
    }

    #[must_use]
    pub fn entry_temperature(&self) -> Option<f64> {
        self.entry_temperature
    }

    #[must_use]
    pub fn exit_time(&self) -> Option<Timestamp> {
        self.exit_time
    }

    #[must_use]
    pub fn exit_temperature(&self) -> Option<f64> {
        self.exit_temperature
    }

    #[must_use]
    pub fn is_parked(&self) -> bool {
        self.is_parked
    }

    /// Whether the car has entered and not yet exited.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.entry_time.is_some() && self.exit_time.is_none()
    }

    /// Record the entry time (now) and the entry temperature.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NonFiniteTemperature`] for a NaN or infinite
    /// temperature and [`StateError::AlreadyEntered`] when entry fields are
    /// already set.
    pub fn enter(&mut self, temperature: f64) -> Result<(), StateError> {
        self.check_temperature(temperature)?;
        if self.entry_time.is_some() {
            return Err(StateError::AlreadyEntered {
                plate: self.license_plate.clone(),
            });
        }
        self.entry_time = Some(time::now());
        self.entry_temperature = Some(temperature);
        Ok(())
    }

    pub fn park(&mut self) {
        self.is_parked = true;
    }

    pub fn unpark(&mut self) {
        self.is_parked = false;
    }

    /// Unpark the car, then record the exit time (now) and exit temperature.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NonFiniteTemperature`] for a NaN or infinite
    /// temperature, [`StateError::NotEntered`] when the car never entered and
    /// [`StateError::AlreadyExited`] when exit fields are already set.
    pub fn exit(&mut self, temperature: f64) -> Result<(), StateError> {
        self.check_temperature(temperature)?;
        if self.entry_time.is_none() {
            return Err(StateError::NotEntered {
                plate: self.license_plate.clone(),
            });
        }
        if self.exit_time.is_some() {
            return Err(StateError::AlreadyExited {
                plate: self.license_plate.clone(),
            });
        }
        self.unpark();
        self.exit_time = Some(time::now());
        self.exit_temperature = Some(temperature);
        Ok(())
    }

    fn check_temperature(&self, temperature: f64) -> Result<(), StateError> {
        if temperature.is_finite() {
            Ok(())
        } else {
            Err(StateError::NonFiniteTemperature {
                plate: self.license_plate.clone(),
            })
        }
    }

    /// Encode as the keyed (JSON) record.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode the keyed (JSON) record. Every key must be present.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Json`] on missing, unknown or mistyped keys.
    pub fn from_json(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Encode as the fixed-order delimited record:
    /// `plate,model,entry_time,exit_time,entry_temperature,exit_temperature,parked`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Delimiter`] when the plate or the model
    /// contains [`CSV_DELIMITER`], since the record could not be read back.
    pub fn to_csv(&self) -> Result<String, ProtocolError> {
        for (field, value) in [
            ("license_plate", &self.license_plate),
            ("car_model", &self.car_model),
        ] {
            if value.contains(CSV_DELIMITER) {
                return Err(ProtocolError::Delimiter {
                    field,
                    value: value.clone(),
                });
            }
        }

        Ok([
            self.license_plate.clone(),
            self.car_model.clone(),
            optional_field(self.entry_time.as_ref().map(time::format)),
            optional_field(self.exit_time.as_ref().map(time::format)),
            optional_field(self.entry_temperature.map(|t| t.to_string())),
            optional_field(self.exit_temperature.map(|t| t.to_string())),
            self.is_parked.to_string(),
        ]
        .join(","))
    }

    /// Decode the fixed-order delimited record produced by [`Car::to_csv`].
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] on a wrong field count or an unparsable
    /// timestamp, temperature or flag.
    pub fn from_csv(raw: &str) -> Result<Self, ProtocolError> {
        let fields: Vec<&str> = raw.trim_end_matches(['\r', '\n']).split(CSV_DELIMITER).collect();
        if fields.len() != CSV_FIELDS {
            return Err(ProtocolError::FieldCount {
                expected: CSV_FIELDS,
                actual: fields.len(),
            });
        }

        Ok(Self {
            license_plate: fields[0].to_string(),
            car_model: fields[1].to_string(),
            entry_time: parse_optional_timestamp("entry_time", fields[2])?,
            exit_time: parse_optional_timestamp("exit_time", fields[3])?,
            entry_temperature: parse_optional_temperature("entry_temperature", fields[4])?,
            exit_temperature: parse_optional_temperature("exit_temperature", fields[5])?,
            is_parked: parse_flag("is_parked", fields[6])?,
        })
    }
}

impl fmt::Display for Car {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.license_plate, self.car_model)
    }
}

/// Fill a random [`PLATE_TEMPLATES`] entry with letters and digits.
#[must_use]
pub fn random_plate<R: Rng + ?Sized>(rng: &mut R) -> String {
    let template = PLATE_TEMPLATES
        .choose(rng)
        .copied()
        .unwrap_or(PLATE_TEMPLATES[0]);

    template
        .chars()
        .map(|c| match c {
            'L' => char::from(PLATE_LETTERS[rng.gen_range(0..PLATE_LETTERS.len())]),
            'N' => char::from(PLATE_DIGITS[rng.gen_range(0..PLATE_DIGITS.len())]),
            other => other,
        })
        .collect()
}

fn optional_field(value: Option<String>) -> String {
    value.unwrap_or_else(|| NULL_SENTINEL.to_string())
}

fn parse_optional_timestamp(
    field: &'static str,
    raw: &str,
) -> Result<Option<Timestamp>, ProtocolError> {
    if raw == NULL_SENTINEL {
        return Ok(None);
    }
    time::parse(raw)
        .map(Some)
        .map_err(|_| ProtocolError::InvalidTimestamp {
            field,
            value: raw.to_string(),
        })
}

fn parse_optional_temperature(
    field: &'static str,
    raw: &str,
) -> Result<Option<f64>, ProtocolError> {
    if raw == NULL_SENTINEL {
        return Ok(None);
    }
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(ProtocolError::InvalidNumber {
            field,
            value: raw.to_string(),
        }),
    }
}

fn parse_flag(field: &'static str, raw: &str) -> Result<bool, ProtocolError> {
    if raw.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ProtocolError::InvalidFlag {
            field,
            value: raw.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn models() -> Vec<String> {
        vec!["ModelA".to_string(), "ModelB".to_string()]
    }

    #[test]
    fn should_start_outside_and_unparked() {
        let car = Car::new("ABC-123", "ModelA");
        assert!(!car.is_parked());
        assert!(!car.is_present());
        assert!(car.entry_time().is_none());
        assert!(car.exit_time().is_none());
    }

    #[test]
    fn should_record_entry_fields_when_entering() {
        let mut car = Car::new("ABC-123", "ModelA");
        car.enter(23.0).unwrap();
        assert!(car.entry_time().is_some());
        assert_eq!(car.entry_temperature(), Some(23.0));
        assert!(car.is_present());
        assert!(!car.is_parked());
    }

    #[test]
    fn should_reject_second_entry() {
        let mut car = Car::new("ABC-123", "ModelA");
        car.enter(23.0).unwrap();
        let result = car.enter(25.0);
        assert_eq!(
            result,
            Err(StateError::AlreadyEntered {
                plate: "ABC-123".to_string()
            })
        );
        assert_eq!(car.entry_temperature(), Some(23.0));
    }

    #[test]
    fn should_reject_non_finite_entry_temperature() {
        let mut car = Car::new("ABC-123", "ModelA");
        assert_eq!(
            car.enter(f64::NAN),
            Err(StateError::NonFiniteTemperature {
                plate: "ABC-123".to_string()
            })
        );
        assert!(car.entry_time().is_none());
        assert!(car.entry_temperature().is_none());

        car.enter(23.0).unwrap();
        let parsed = Car::from_json(&car.to_json().unwrap()).unwrap();
        assert_eq!(parsed.entry_temperature(), Some(23.0));
    }

    #[test]
    fn should_reject_infinite_exit_temperature() {
        let mut car = Car::new("ABC-123", "ModelA");
        car.enter(23.0).unwrap();
        assert!(matches!(
            car.exit(f64::INFINITY),
            Err(StateError::NonFiniteTemperature { .. })
        ));
        assert!(car.exit_time().is_none());
        assert!(car.is_present());
    }

    #[test]
    fn should_toggle_parked_flag_regardless_of_lifecycle() {
        let mut car = Car::new("ABC-123", "ModelA");
        car.park();
        assert!(car.is_parked());
        car.unpark();
        assert!(!car.is_parked());
    }

    #[test]
    fn should_unpark_and_record_exit_fields_when_exiting() {
        let mut car = Car::new("ABC-123", "ModelA");
        car.enter(23.0).unwrap();
        car.park();
        car.exit(24.0).unwrap();
        assert!(!car.is_parked());
        assert!(car.exit_time().is_some());
        assert_eq!(car.exit_temperature(), Some(24.0));
        assert!(car.exit_time() >= car.entry_time());
        assert!(!car.is_present());
    }

    #[test]
    fn should_reject_exit_before_entry() {
        let mut car = Car::new("ABC-123", "ModelA");
        assert!(matches!(car.exit(24.0), Err(StateError::NotEntered { .. })));
        assert!(car.exit_time().is_none());
    }

    #[test]
    fn should_reject_second_exit() {
        let mut car = Car::new("ABC-123", "ModelA");
        car.enter(23.0).unwrap();
        car.exit(24.0).unwrap();
        assert!(matches!(
            car.exit(25.0),
            Err(StateError::AlreadyExited { .. })
        ));
        assert_eq!(car.exit_temperature(), Some(24.0));
    }

    #[test]
    fn should_display_plate_and_model() {
        let car = Car::new("ABC-123", "ModelA");
        assert_eq!(car.to_string(), "ABC-123 - ModelA");
    }

    #[test]
    fn should_write_explicit_nulls_in_json_for_unset_fields() {
        let car = Car::new("ABC-123", "ModelA");
        let json = car.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"license_plate":"ABC-123","car_model":"ModelA","entry_time":null,"exit_time":null,"entry_temperature":null,"exit_temperature":null,"is_parked":false}"#
        );
    }

    #[test]
    fn should_roundtrip_entered_car_through_json() {
        let mut car = Car::new("ABC-123", "ModelA");
        car.enter(23.5).unwrap();
        car.park();
        let parsed = Car::from_json(&car.to_json().unwrap()).unwrap();
        assert_eq!(parsed, car);
    }

    #[test]
    fn should_reject_json_with_missing_key() {
        let raw = r#"{"license_plate":"ABC-123","car_model":"ModelA","is_parked":false}"#;
        assert!(matches!(Car::from_json(raw), Err(ProtocolError::Json(_))));
    }

    #[test]
    fn should_reject_json_without_temperature_keys() {
        let raw = r#"{"license_plate":"ABC-123","car_model":"ModelA","entry_time":null,"exit_time":null,"is_parked":false}"#;
        assert!(matches!(Car::from_json(raw), Err(ProtocolError::Json(_))));
    }

    #[test]
    fn should_reject_json_with_unknown_key() {
        let mut value = serde_json::to_value(Car::new("ABC-123", "ModelA")).unwrap();
        value["colour"] = serde_json::json!("red");
        assert!(Car::from_json(&value.to_string()).is_err());
    }

    #[test]
    fn should_write_null_sentinels_in_csv_for_unset_fields() {
        let car = Car::new("ABC-123", "ModelA");
        assert_eq!(
            car.to_csv().unwrap(),
            "ABC-123,ModelA,null,null,null,null,false"
        );
    }

    #[test]
    fn should_refuse_csv_when_model_contains_delimiter() {
        let mut car = Car::new("ABC-123", "Model,X");
        car.enter(23.0).unwrap();
        assert!(matches!(
            car.to_csv(),
            Err(ProtocolError::Delimiter {
                field: "car_model",
                ..
            })
        ));
    }

    #[test]
    fn should_refuse_csv_when_plate_contains_delimiter() {
        let car = Car::new("ABC,123", "ModelA");
        assert!(matches!(
            car.to_csv(),
            Err(ProtocolError::Delimiter {
                field: "license_plate",
                ..
            })
        ));
    }

    #[test]
    fn should_roundtrip_exited_car_through_csv() {
        let mut car = Car::new("1AB-234", "ModelB");
        car.enter(21.0).unwrap();
        car.exit(22.25).unwrap();
        let parsed = Car::from_csv(&car.to_csv().unwrap()).unwrap();
        assert_eq!(parsed, car);
    }

    #[test]
    fn should_parse_csv_from_known_line() {
        let car =
            Car::from_csv("ABC-123,ModelA,2024-01-02 03:04:05,null,23,null,True\n").unwrap();
        assert_eq!(car.license_plate(), "ABC-123");
        assert_eq!(
            car.entry_time().map(|ts| time::format(&ts)).as_deref(),
            Some("2024-01-02 03:04:05")
        );
        assert_eq!(car.entry_temperature(), Some(23.0));
        assert!(car.exit_time().is_none());
        assert!(car.is_parked());
    }

    #[test]
    fn should_reject_csv_with_wrong_field_count() {
        let result = Car::from_csv("ABC-123,ModelA,null");
        assert!(matches!(
            result,
            Err(ProtocolError::FieldCount {
                expected: 7,
                actual: 3
            })
        ));
    }

    #[test]
    fn should_reject_csv_with_bad_flag() {
        let result = Car::from_csv("ABC-123,ModelA,null,null,null,null,maybe");
        assert!(matches!(result, Err(ProtocolError::InvalidFlag { .. })));
    }

    #[test]
    fn should_reject_csv_with_bad_temperature() {
        let result = Car::from_csv("ABC-123,ModelA,null,null,hot,null,false");
        assert!(matches!(
            result,
            Err(ProtocolError::InvalidNumber {
                field: "entry_temperature",
                ..
            })
        ));
    }

    #[test]
    fn should_generate_plates_matching_a_template() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..200 {
            let plate = random_plate(&mut rng);
            let matches_template = PLATE_TEMPLATES.iter().any(|template| {
                template.len() == plate.len()
                    && template.chars().zip(plate.chars()).all(|(t, p)| match t {
                        'L' => p.is_ascii_uppercase(),
                        'N' => p.is_ascii_digit(),
                        other => other == p,
                    })
            });
            assert!(matches_template, "unexpected plate {plate}");
        }
    }

    #[test]
    fn should_generate_same_car_for_same_seed() {
        let a = Car::random(&mut ChaCha8Rng::seed_from_u64(3), &models());
        let b = Car::random(&mut ChaCha8Rng::seed_from_u64(3), &models());
        assert_eq!(a, b);
    }

    #[test]
    fn should_pick_model_from_candidates() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..20 {
            let car = Car::random(&mut rng, &models());
            assert!(models().iter().any(|m| m == car.model()));
        }
    }

    #[test]
    fn should_leave_model_empty_without_candidates() {
        let car = Car::random(&mut ChaCha8Rng::seed_from_u64(1), &[]);
        assert_eq!(car.model(), "");
    }
}
