//! Output side of the stage contract: where artifacts get written and where the
//! returned record gets persisted.
//!
//! A real workflow manager owns storage and versioning. `LocalBundle` is the
//! minimal directory-backed stand-in used by the command line and the tests.

mod output_file;

pub use output_file::OutputFile;

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use log::debug;

use crate::fileformat::Table;

pub const RECORD_FILE_NAME: &str = "bundle.csv";

/// Longest file name most filesystems accept, in bytes
const NAME_MAX: usize = 255;

/// Longest output name, leaving room for the partial file decoration
pub const MAX_OUTPUT_NAME_LEN: usize = NAME_MAX - output_file::PARTIAL_NAME_OVERHEAD;

///////////////////////////////
/// Hands out writable output locations for one stage invocation
pub trait OutputContext {
    /// Allocate a new output file with the given logical name
    fn create_output_file(&mut self, name: &str) -> io::Result<OutputFile>;
}

///////////////////////////////
/// Output bundle backed by a single directory
#[derive(Debug, Clone)]
pub struct LocalBundle {
    dir: PathBuf,
}

impl LocalBundle {
    /// Create the bundle directory if needed
    pub fn create(dir: impl AsRef<Path>) -> anyhow::Result<LocalBundle> {
        let dir = crate::utils::to_absolute_path(dir.as_ref())
            .context("Failed to get absolute path for output bundle")?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Could not create output bundle directory {}", dir.display()))?;
        debug!("Using output bundle {}", dir.display());
        Ok(LocalBundle { dir })
    }

    /// Open an existing bundle
    pub fn open(dir: impl AsRef<Path>) -> anyhow::Result<LocalBundle> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            anyhow::bail!("Output bundle {} does not exist", dir.display());
        }
        Ok(LocalBundle {
            dir: crate::utils::to_absolute_path(dir)?,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self) -> PathBuf {
        self.dir.join(RECORD_FILE_NAME)
    }

    /// Store the record a stage returned. Goes through an OutputFile so a half-written record is never visible
    pub fn persist(&mut self, record: &Table) -> anyhow::Result<PathBuf> {
        let mut out = self.create_output_file(RECORD_FILE_NAME)?;
        record.write_csv(&mut out)?;
        let path = out.commit()?;
        debug!("Persisted stage record to {}", path.display());
        Ok(path)
    }

    pub fn read_record(&self) -> anyhow::Result<Table> {
        let p = self.record_path();
        let f = File::open(&p).with_context(|| format!("No record in bundle {}", self.dir.display()))?;
        Table::read_csv(f, b',')
    }
}

impl OutputContext for LocalBundle {
    fn create_output_file(&mut self, name: &str) -> io::Result<OutputFile> {
        check_output_name(name)?;
        OutputFile::create(&self.dir, name)
    }
}

/// Output names are file names inside the bundle, nothing that could escape it
pub fn check_output_name(name: &str) -> io::Result<()> {
    if name.len() > MAX_OUTPUT_NAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Output file name is {} bytes, at most {} are allowed", name.len(), MAX_OUTPUT_NAME_LEN),
        ));
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains('/') && !name.contains('\\') => Ok(()),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("'{}' is not a valid output file name", name),
        )),
    }
}
