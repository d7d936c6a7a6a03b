use crate::error::Error;
use crate::result::Result;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Resolve the project root from `--path` or the current directory
pub fn find_project_root(path: Option<&Path>) -> Result<PathBuf> {
    let base_path = match path {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir()?,
    };

    if !base_path.is_dir() {
        return Err(Error::custom(format!(
            "Project root {} is not a directory",
            base_path.display()
        )));
    }

    Ok(base_path)
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        fs::create_dir_all(path).map_err(|e| Error::io("create directory", path, e))?;
    }
    Ok(())
}

/// Remove a directory tree; returns `false` when it was already absent
pub fn remove_dir_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Remove a single file; returns `false` when it was already absent
pub fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Archive entry name for `path`, always `/`-separated
pub fn entry_name(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
