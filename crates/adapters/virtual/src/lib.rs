//! # smartpark-adapter-virtual
//!
//! Virtual detectors that stand in for physical entry/exit sensors.
//!
//! ## Provided detectors
//!
//! | Detector | Sequence | Pacing |
//! |----------|----------|--------|
//! | [`RandomDetector`] | Infinite, `Enter` with a configured probability | Uniform pause between two bounds |
//! | [`FileDetector`] | Finite, one detection per `Signal,Temperature` line | Fixed pause (default none) |
//!
//! ## Dependency rule
//!
//! Depends on `smartpark-app` (port traits) and `smartpark-domain` only.

mod file;
mod random;

pub use file::FileDetector;
pub use random::{RandomDetector, RandomDetectorConfig};

use std::future::Future;
use std::time::Duration;

use smartpark_app::ports::Detector;
use smartpark_domain::signal::SignalMessage;

/// Wrapper enum for the concrete virtual detectors, so the binary can pick
/// one from configuration.
pub enum VirtualDetector {
    Random(RandomDetector),
    File(FileDetector),
}

impl Detector for VirtualDetector {
    fn next_detection(&mut self) -> impl Future<Output = Option<SignalMessage>> + Send {
        let (signal, pause) = match self {
            Self::Random(d) => {
                let (signal, pause) = d.step();
                (Some(signal), pause)
            }
            Self::File(d) => (d.next(), d.interval()),
        };
        paced(signal, pause)
    }
}

/// Wait `pause` before handing out `detection`. Nothing is awaited once
/// the sequence has ended.
pub(crate) fn paced(
    detection: Option<SignalMessage>,
    pause: Duration,
) -> impl Future<Output = Option<SignalMessage>> + Send {
    async move {
        if detection.is_some() && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
        detection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_delegate_to_random_detector() {
        let config = RandomDetectorConfig {
            min_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
            ..RandomDetectorConfig::default()
        };
        let mut detector = VirtualDetector::Random(RandomDetector::seeded(config, 3));

        for _ in 0..5 {
            assert!(detector.next_detection().await.is_some());
        }
    }
}
