//! Daily-rotating file logger.
//!
//! The crawler keeps an operator-facing activity log separate from the
//! `tracing` diagnostics: one file per local date named
//! `crawler-YYYY-MM-DD.log`, each line
//! `YYYY/MM/DD HH:MM:SS [LEVEL] <text>`. Records are mirrored to `tracing`
//! so nothing is lost when the files are not being watched.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, info};

/// Errors opening or rotating log files.
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Info,
    Error,
    Debug,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Error => "ERROR",
            Level::Debug => "DEBUG",
        }
    }
}

struct LogFile {
    file: File,
    date: String,
}

/// Thread-safe logger that rotates to a new file when the local date
/// changes.
pub struct DailyLogger {
    dir: PathBuf,
    state: Mutex<Option<LogFile>>,
    /// When false the logger only mirrors to `tracing` (used in tests).
    to_disk: bool,
}

impl DailyLogger {
    /// Creates the log directory and opens today's file.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, LoggerError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let logger = Self {
            dir,
            state: Mutex::new(None),
            to_disk: true,
        };
        logger.with_current_file(|_| Ok(()))?;
        Ok(logger)
    }

    /// A logger that writes no files; records still reach `tracing`.
    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            state: Mutex::new(None),
            to_disk: false,
        }
    }

    pub fn info(&self, message: &str) {
        info!(target: "crawler", "{message}");
        self.write(Level::Info, message);
    }

    pub fn error(&self, message: &str) {
        error!(target: "crawler", "{message}");
        self.write(Level::Error, message);
    }

    pub fn debug(&self, message: &str) {
        debug!(target: "crawler", "{message}");
        self.write(Level::Debug, message);
    }

    /// Path of the file for the current local date.
    pub fn current_path(&self) -> PathBuf {
        self.dir
            .join(format!("crawler-{}.log", Local::now().format("%Y-%m-%d")))
    }

    fn write(&self, level: Level, message: &str) {
        if !self.to_disk {
            return;
        }

        let line = format!(
            "{} [{}] {}\n",
            Local::now().format("%Y/%m/%d %H:%M:%S"),
            level.tag(),
            message
        );

        let result = self.with_current_file(|file| {
            file.write_all(line.as_bytes())?;
            Ok(())
        });

        if let Err(e) = result {
            error!(error = %e, "log file write failed");
        }
    }

    /// Runs `f` on today's file, rotating first if the date changed.
    fn with_current_file(
        &self,
        f: impl FnOnce(&mut File) -> Result<(), LoggerError>,
    ) -> Result<(), LoggerError> {
        let today = Local::now().format("%Y-%m-%d").to_string();
        let mut state = self.state.lock();

        let needs_rotate = state.as_ref().map(|s| s.date != today).unwrap_or(true);
        if needs_rotate {
            let path = self.dir.join(format!("crawler-{today}.log"));
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            *state = Some(LogFile { file, date: today });
        }

        // Freshly set above when absent.
        let log = state.as_mut().expect("log file initialized");
        f(&mut log.file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_dated_file_with_level_tags() {
        let dir = tempfile::tempdir().unwrap();
        let logger = DailyLogger::new(dir.path()).unwrap();

        logger.info("crawler started");
        logger.error("store down");
        logger.debug("noise");

        let path = logger.current_path();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("crawler-"));
        assert!(name.ends_with(".log"));

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[INFO] crawler started"));
        assert!(content.contains("[ERROR] store down"));
        assert!(content.contains("[DEBUG] noise"));

        // Each line starts with a YYYY/MM/DD HH:MM:SS stamp.
        for line in content.lines() {
            let (stamp, _) = line.split_at(19);
            assert_eq!(stamp.as_bytes()[4], b'/');
            assert_eq!(stamp.as_bytes()[13], b':');
        }
    }

    #[test]
    fn disabled_logger_writes_nothing() {
        let logger = DailyLogger::disabled();
        logger.info("goes only to tracing");
        assert!(!logger.current_path().exists());
    }
}
