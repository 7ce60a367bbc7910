use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use log::{debug, warn};
use rand::Rng;

/// Bytes the partial file name adds to the final name: ".", ".", 8 hex digits and ".partial"
pub(crate) const PARTIAL_NAME_OVERHEAD: usize = 18;

///////////////////////////////
/// Writable output location. Content goes to a hidden partial file, and only becomes
/// visible under its final name on commit(). Dropping without commit removes the partial file
#[derive(Debug)]
pub struct OutputFile {
    file: Option<File>,
    path_partial: PathBuf,
    path_final: PathBuf,
}

impl OutputFile {
    pub(crate) fn create(dir: &Path, name: &str) -> io::Result<OutputFile> {
        let mut rng = rand::thread_rng();
        let n: u32 = rng.gen();

        let path_partial = dir.join(format!(".{}.{:08x}.partial", name, n));
        let path_final = dir.join(name);
        let file = File::create_new(&path_partial)?;
        debug!("Allocated {} (partial {})", path_final.display(), path_partial.display());

        Ok(OutputFile {
            file: Some(file),
            path_partial,
            path_final,
        })
    }

    /// Location the content is published to
    pub fn path(&self) -> &Path {
        &self.path_final
    }

    pub fn partial_path(&self) -> &Path {
        &self.path_partial
    }

    /// A handle usable as the stdout of a child process. Shares the file offset with this one
    pub fn as_stdio(&self) -> io::Result<Stdio> {
        Ok(Stdio::from(self.file()?.try_clone()?))
    }

    fn file(&self) -> io::Result<&File> {
        self.file
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "output file already closed"))
    }

    fn file_mut(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "output file already closed"))
    }

    /// Flush, close and publish under the final name
    pub fn commit(mut self) -> io::Result<PathBuf> {
        let file = self.file.take();
        let published = (|| -> io::Result<()> {
            if let Some(mut file) = file {
                file.flush()?;
                file.sync_all()?;
            }
            fs::rename(&self.path_partial, &self.path_final)
        })();

        if let Err(e) = published {
            _ = fs::remove_file(&self.path_partial);
            return Err(e);
        }
        Ok(self.path_final.clone())
    }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file_mut()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file_mut()?.flush()
    }
}

impl Drop for OutputFile {
    fn drop(&mut self) {
        //Only still open if commit() never happened
        if self.file.take().is_some() {
            if let Err(e) = fs::remove_file(&self.path_partial) {
                warn!("Could not remove partial output {}: {}", self.path_partial.display(), e);
            }
        }
    }
}
