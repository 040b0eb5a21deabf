//! Random detector — an endless stream of simulated detections.

use std::future::Future;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use smartpark_app::ports::Detector;
use smartpark_domain::signal::SignalMessage;

/// Shape of the random stream.
#[derive(Debug, Clone)]
pub struct RandomDetectorConfig {
    /// Lowest temperature reported (inclusive).
    pub lower_temperature: i32,
    /// Highest temperature reported (inclusive).
    pub upper_temperature: i32,
    /// Probability that a detection is an entry rather than an exit.
    pub enter_probability: f64,
    pub min_interval: Duration,
    pub max_interval: Duration,
}

impl Default for RandomDetectorConfig {
    fn default() -> Self {
        Self {
            lower_temperature: 20,
            upper_temperature: 30,
            enter_probability: 0.6,
            min_interval: Duration::from_millis(40),
            max_interval: Duration::from_millis(500),
        }
    }
}

/// Emits `Enter` with probability `enter_probability` (otherwise `Exit`),
/// an integer temperature within the bounds, after a uniform pause.
///
/// Swapped bounds are reordered and the probability is clamped to `[0, 1]`.
pub struct RandomDetector {
    rng: ChaCha8Rng,
    config: RandomDetectorConfig,
}

impl RandomDetector {
    #[must_use]
    pub fn new(config: RandomDetectorConfig) -> Self {
        Self::with_rng(config, ChaCha8Rng::from_entropy())
    }

    #[must_use]
    pub fn seeded(config: RandomDetectorConfig, seed: u64) -> Self {
        Self::with_rng(config, ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(mut config: RandomDetectorConfig, rng: ChaCha8Rng) -> Self {
        if config.lower_temperature > config.upper_temperature {
            std::mem::swap(&mut config.lower_temperature, &mut config.upper_temperature);
        }
        if config.min_interval > config.max_interval {
            std::mem::swap(&mut config.min_interval, &mut config.max_interval);
        }
        config.enter_probability = if config.enter_probability.is_nan() {
            0.0
        } else {
            config.enter_probability.clamp(0.0, 1.0)
        };
        Self { rng, config }
    }

    #[must_use]
    pub fn config(&self) -> &RandomDetectorConfig {
        &self.config
    }

    /// Draw the next detection without waiting.
    pub fn next_signal(&mut self) -> SignalMessage {
        let temperature = f64::from(
            self.rng
                .gen_range(self.config.lower_temperature..=self.config.upper_temperature),
        );
        if self.rng.gen_bool(self.config.enter_probability) {
            SignalMessage::enter(temperature)
        } else {
            SignalMessage::exit(temperature)
        }
    }

    /// Draw the pause preceding the next detection.
    pub fn next_pause(&mut self) -> Duration {
        self.rng
            .gen_range(self.config.min_interval..=self.config.max_interval)
    }

    pub(crate) fn step(&mut self) -> (SignalMessage, Duration) {
        let pause = self.next_pause();
        (self.next_signal(), pause)
    }
}

impl Detector for RandomDetector {
    fn next_detection(&mut self) -> impl Future<Output = Option<SignalMessage>> + Send {
        let (signal, pause) = self.step();
        crate::paced(Some(signal), pause)
    }
}
