//! Display renderers — console output and the snapshot recorder file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use smartpark_app::ports::DisplayRenderer;
use smartpark_domain::error::SmartParkError;
use smartpark_domain::snapshot::Snapshot;
use smartpark_domain::time;

fn sink(err: io::Error) -> SmartParkError {
    SmartParkError::Sink(Box::new(err))
}

/// Prints each snapshot as a block of labelled lines.
pub struct ConsoleDisplay<W> {
    title: String,
    out: W,
}

impl ConsoleDisplay<io::Stdout> {
    /// Console display writing to standard output.
    #[must_use]
    pub fn stdout(title: impl Into<String>) -> Self {
        Self::new(title, io::stdout())
    }
}

impl<W: Write> ConsoleDisplay<W> {
    pub fn new(title: impl Into<String>, out: W) -> Self {
        Self {
            title: title.into(),
            out,
        }
    }
}

impl<W: Write + Send> DisplayRenderer for ConsoleDisplay<W> {
    fn render(&mut self, snapshot: &Snapshot) -> Result<(), SmartParkError> {
        let lines = [
            ("Available bays", snapshot.available_bays.to_string()),
            ("Temperature", format!("{}℃", snapshot.temperature)),
            ("At", time::format(&snapshot.last_event)),
            ("Cars", snapshot.total_cars.to_string()),
            ("Parked", snapshot.parked_cars.to_string()),
            ("Un-parked", snapshot.un_parked_cars.to_string()),
        ];
        writeln!(self.out, "==== {} ====", self.title).map_err(sink)?;
        for (label, value) in lines {
            writeln!(self.out, "{label:<15}: {value}").map_err(sink)?;
        }
        self.out.flush().map_err(sink)
    }

    fn teardown(&mut self) -> Result<(), SmartParkError> {
        writeln!(self.out, "==== {} closed ====", self.title).map_err(sink)?;
        self.out.flush().map_err(sink)
    }
}

/// Appends one comma-separated record per snapshot to a data file.
pub struct SnapshotRecorder {
    file: File,
}

impl SnapshotRecorder {
    /// Open `path` for appending, creating it and its parent directories.
    ///
    /// # Errors
    ///
    /// Returns the I/O error when the directories or the file cannot be
    /// created.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        tracing::debug!(path = %path.display(), "recording snapshots");
        Ok(Self { file })
    }
}

impl DisplayRenderer for SnapshotRecorder {
    fn render(&mut self, snapshot: &Snapshot) -> Result<(), SmartParkError> {
        let line = format!("{}\n", snapshot.to_record());
        self.file.write_all(line.as_bytes()).map_err(sink)
    }

    fn teardown(&mut self) -> Result<(), SmartParkError> {
        self.file.flush().map_err(sink)
    }
}

/// Fans every snapshot out to several renderers.
///
/// Every renderer is tried; the first failure is reported.
#[derive(Default)]
pub struct DisplaySinks(Vec<Box<dyn DisplayRenderer>>);

impl DisplaySinks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, renderer: impl DisplayRenderer + 'static) -> Self {
        self.0.push(Box::new(renderer));
        self
    }
}

impl DisplayRenderer for DisplaySinks {
    fn render(&mut self, snapshot: &Snapshot) -> Result<(), SmartParkError> {
        let mut first_err = None;
        for renderer in &mut self.0 {
            if let Err(err) = renderer.render(snapshot) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn teardown(&mut self) -> Result<(), SmartParkError> {
        let mut first_err = None;
        for renderer in &mut self.0 {
            if let Err(err) = renderer.teardown() {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample() -> Snapshot {
        "3;23.5;2024-01-02 03:04:05;2;2;0".parse().unwrap()
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("smartparkd-{}-{name}", std::process::id()))
            .join("data")
            .join("display_messages.txt")
    }

    #[test]
    fn should_print_labelled_lines_when_rendering() {
        let mut out = Vec::new();
        ConsoleDisplay::new("display1", &mut out)
            .render(&sample())
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("==== display1 ====\n"));
        assert!(text.contains("Available bays : 3\n"));
        assert!(text.contains("Temperature    : 23.5℃\n"));
        assert!(text.contains("At             : 2024-01-02 03:04:05\n"));
        assert!(text.contains("Un-parked      : 0\n"));
    }

    #[test]
    fn should_append_records_and_create_parent_dirs() {
        let path = temp_path("recorder");
        let _ = std::fs::remove_dir_all(path.parent().unwrap().parent().unwrap());

        let mut recorder = SnapshotRecorder::open(&path).unwrap();
        recorder.render(&sample()).unwrap();
        recorder.render(&sample()).unwrap();
        recorder.teardown().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "3,23.5,2024-01-02 03:04:05,2,2,0\n3,23.5,2024-01-02 03:04:05,2,2,0\n"
        );
        let _ = std::fs::remove_dir_all(path.parent().unwrap().parent().unwrap());
    }

    struct Failing;

    impl DisplayRenderer for Failing {
        fn render(&mut self, _snapshot: &Snapshot) -> Result<(), SmartParkError> {
            Err(sink(io::Error::other("screen unplugged")))
        }
    }

    #[test]
    fn should_render_every_sink_when_one_fails() {
        let path = temp_path("sinks");
        let _ = std::fs::remove_dir_all(path.parent().unwrap().parent().unwrap());
        let recorder = SnapshotRecorder::open(&path).unwrap();
        let mut sinks = DisplaySinks::new().with(Failing).with(recorder);

        assert!(sinks.render(&sample()).is_err());

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        let _ = std::fs::remove_dir_all(path.parent().unwrap().parent().unwrap());
    }
}
