//! File detector — replays `Signal,Temperature` lines from a text file.

use std::fs::File;
use std::future::Future;
use std::io::{self, BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use std::time::Duration;

use smartpark_app::ports::Detector;
use smartpark_domain::signal::{Signal, SignalMessage};

/// Finite, restartable sequence of detections read lazily from a file.
///
/// Blank lines and lines whose signal is neither `Enter` nor `Exit` are
/// skipped. Malformed lines are logged and skipped. A read error ends the
/// sequence.
///
/// As a [`Detector`] the reads run on the blocking thread pool.
pub struct FileDetector {
    path: PathBuf,
    /// `None` once the reader was lost to a failed blocking read.
    replay: Option<Replay>,
    interval: Duration,
}

impl FileDetector {
    /// Open `path` for replay.
    ///
    /// # Errors
    ///
    /// Returns the I/O error when the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let replay = Replay::open(&path)?;
        Ok(Self {
            path,
            replay: Some(replay),
            interval: Duration::ZERO,
        })
    }

    /// Pause between two detections when used as a [`Detector`].
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Rewind to the first line.
    ///
    /// # Errors
    ///
    /// Returns the I/O error when the file can no longer be opened.
    pub fn restart(&mut self) -> io::Result<()> {
        self.replay = Some(Replay::open(&self.path)?);
        tracing::debug!(path = %self.path.display(), "signal replay restarted");
        Ok(())
    }
}

impl Iterator for FileDetector {
    type Item = SignalMessage;

    fn next(&mut self) -> Option<Self::Item> {
        self.replay.as_mut()?.next()
    }
}

impl Detector for FileDetector {
    fn next_detection(&mut self) -> impl Future<Output = Option<SignalMessage>> + Send {
        async move {
            let mut replay = self.replay.take()?;
            let read = tokio::task::spawn_blocking(move || {
                let detection = replay.next();
                (replay, detection)
            });
            let detection = match read.await {
                Ok((replay, detection)) => {
                    self.replay = Some(replay);
                    detection
                }
                Err(err) => {
                    tracing::warn!(%err, path = %self.path.display(), "signal replay aborted");
                    None
                }
            };
            crate::paced(detection, self.interval).await
        }
    }
}

/// Open reader over a replay file.
struct Replay {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_number: usize,
}

impl Replay {
    fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(File::open(path)?).lines(),
            line_number: 0,
        })
    }
}

impl Iterator for Replay {
    type Item = SignalMessage;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => {
                    tracing::warn!(%err, path = %self.path.display(), "signal replay aborted");
                    return None;
                }
            };
            self.line_number += 1;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.parse::<SignalMessage>() {
                Ok(msg) if matches!(msg.signal, Signal::Enter | Signal::Exit) => return Some(msg),
                Ok(msg) => {
                    tracing::debug!(line = self.line_number, signal = %msg.signal, "skipping unknown signal");
                }
                Err(err) => {
                    tracing::warn!(%err, line = self.line_number, content = line, "skipping malformed signal line");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("smartpark-virtual-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn should_replay_enter_and_exit_lines_in_order() {
        let path = fixture("ordered.txt", "Enter,23\nExit,24.5\nEnter,20\n");
        let detector = FileDetector::open(&path).unwrap();

        let replayed: Vec<SignalMessage> = detector.collect();

        assert_eq!(
            replayed,
            vec![
                SignalMessage::enter(23.0),
                SignalMessage::exit(24.5),
                SignalMessage::enter(20.0),
            ]
        );
    }

    #[test]
    fn should_skip_unknown_blank_and_malformed_lines() {
        let path = fixture(
            "noisy.txt",
            "Enter,23\n\nPark,22\nExit\nExit,warm\nExit,21\n",
        );
        let detector = FileDetector::open(&path).unwrap();

        let replayed: Vec<SignalMessage> = detector.collect();

        assert_eq!(
            replayed,
            vec![SignalMessage::enter(23.0), SignalMessage::exit(21.0)]
        );
    }

    #[test]
    fn should_replay_again_after_restart() {
        let path = fixture("restart.txt", "Enter,23\nExit,24\n");
        let mut detector = FileDetector::open(&path).unwrap();

        assert_eq!(detector.by_ref().count(), 2);
        assert!(detector.next().is_none());

        detector.restart().unwrap();
        assert_eq!(detector.next(), Some(SignalMessage::enter(23.0)));
    }

    #[test]
    fn should_fail_open_when_file_missing() {
        let path = std::env::temp_dir().join("smartpark-virtual-missing/none.txt");
        assert!(FileDetector::open(path).is_err());
    }

    #[tokio::test]
    async fn should_end_detection_sequence_at_end_of_file() {
        let path = fixture("finite.txt", "Exit,19\n");
        let mut detector = FileDetector::open(&path).unwrap();

        assert_eq!(
            detector.next_detection().await,
            Some(SignalMessage::exit(19.0))
        );
        assert_eq!(detector.next_detection().await, None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn should_read_off_the_runtime_thread_when_detecting() {
        let path = fixture("blocking.txt", "Enter,23\nExit,24\n");
        let mut detector = FileDetector::open(&path).unwrap();

        assert_eq!(
            detector.next_detection().await,
            Some(SignalMessage::enter(23.0))
        );
        // the reader comes back from the blocking pool and keeps its position
        assert_eq!(detector.next(), Some(SignalMessage::exit(24.0)));
        detector.restart().unwrap();
        assert_eq!(
            detector.next_detection().await,
            Some(SignalMessage::enter(23.0))
        );
    }
}
