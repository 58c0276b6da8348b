//! Append-only simulation log files, one per component name.
//!
//! Each sink writes `[ddMMyy HH:mm:ss] message` lines to a file named
//! after its creation time and component. Constructing a sink archives
//! any previous log of the same component into an `Archive/` subdirectory.
//! Write failures never reach the simulation; they go to stderr.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;

const FILE_STAMP: &str = "%d%m%y_%H%M%S";
const LINE_STAMP: &str = "%d%m%y %H:%M:%S";

pub struct FileLogger {
    name: String,
    path: PathBuf,
    file: Mutex<File>,
}

impl FileLogger {
    /// Open a new log file for `name` under `dir`, archiving any prior
    /// same-name log first.
    pub fn new(dir: &Path, name: &str) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        archive_existing(dir, name)?;

        let filename = format!("{}-{name}.txt", Local::now().format(FILE_STAMP));
        let path = dir.join(filename);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let logger = Self {
            name: name.to_string(),
            path,
            file: Mutex::new(file),
        };
        logger.log(&format!("==== Log started for {name} ===="));
        Ok(logger)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped record. Failures are swallowed after a
    /// stderr note.
    pub fn log(&self, message: &str) {
        let line = format!("[{}] {message}\n", Local::now().format(LINE_STAMP));
        let mut file = self.file.lock().expect("log file lock poisoned");
        if let Err(err) = file.write_all(line.as_bytes()) {
            eprintln!("error writing to log {}: {err}", self.path.display());
        }
    }
}

/// Move any `*-<name>.txt` already in `dir` into `dir/Archive/`.
fn archive_existing(dir: &Path, name: &str) -> std::io::Result<()> {
    let suffix = format!("-{name}.txt");
    let mut to_archive = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        if entry.file_type()?.is_file()
            && file_name.to_string_lossy().ends_with(&suffix)
        {
            to_archive.push((entry.path(), file_name));
        }
    }

    if to_archive.is_empty() {
        return Ok(());
    }

    let archive_dir = dir.join("Archive");
    std::fs::create_dir_all(&archive_dir)?;
    for (path, file_name) in to_archive {
        std::fs::rename(&path, archive_dir.join(file_name))?;
    }
    Ok(())
}
