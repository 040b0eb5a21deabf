//! Detector port — the source of vehicle detections behind a sensor.

use std::future::Future;

use smartpark_domain::signal::SignalMessage;

/// A paced sequence of detections.
///
/// Each call waits as long as the detector's pacing requires, then yields
/// the next detection. `None` means the sequence is exhausted.
pub trait Detector: Send {
    fn next_detection(&mut self) -> impl Future<Output = Option<SignalMessage>> + Send;
}
