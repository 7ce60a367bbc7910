use std::io;
use std::path::{Path, PathBuf};

use path_clean::PathClean;

/// Absolute, lexically cleaned version of a path. Does not touch the filesystem, so the path need not exist
pub fn to_absolute_path(path: impl AsRef<Path>) -> io::Result<PathBuf> {
    let path = path.as_ref();

    let absolute_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    }
    .clean();

    Ok(absolute_path)
}
