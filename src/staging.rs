use crate::context::Context;
use crate::error::Error;
use crate::result::Result;
use crate::selector::Selector;
use crate::utils;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Freshly created staging directory, removed when dropped
///
/// Call [`StagingTree::finalize`] on the success path to surface removal
/// errors; every other exit path falls back to a best-effort removal in `Drop`.
pub struct StagingTree {
    path: PathBuf,
    finalized: bool,
}

impl StagingTree {
    /// Remove any leftover tree at `path` and create an empty one
    pub fn prepare(path: &Path) -> Result<Self> {
        utils::remove_dir_if_exists(path).map_err(|e| Error::cleanup(path, e))?;

        // `create_dir` (not `_all`) so a tree that reappeared is never merged into
        fs::create_dir(path).map_err(|e| Error::io("create staging directory", path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            finalized: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy a single file into the staging root, keeping its file name
    pub fn stage_file(&self, ctx: &Context, source: &Path) -> Result<PathBuf> {
        let name = source
            .file_name()
            .ok_or_else(|| Error::custom(format!("{} has no file name", source.display())))?;
        let destination = self.path.join(name);

        if ctx.verbose {
            println!("Copying {} to {}", source.display(), destination.display());
        }

        fs::copy(source, &destination).map_err(|e| Error::io("copy", source, e))?;
        Ok(destination)
    }

    /// Mirror `source_root/subtree` into the staging tree, skipping excluded entries
    ///
    /// Paths handed to the selector are relative to `source_root`, so the
    /// staged layout and the selector input are the same. Returns the number
    /// of files copied.
    pub fn stage_tree(
        &self,
        ctx: &Context,
        source_root: &Path,
        subtree: &Path,
        selector: &Selector,
    ) -> Result<usize> {
        let source = source_root.join(subtree);
        let metadata =
            fs::metadata(&source).map_err(|e| Error::io("read content directory", &source, e))?;
        if !metadata.is_dir() {
            return Err(Error::io(
                "read content directory",
                &source,
                io::Error::other("not a directory"),
            ));
        }

        let walker = WalkDir::new(&source)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || entry.path().strip_prefix(source_root).is_ok_and(|rel| {
                        selector.includes(rel, entry.file_type().is_dir())
                    })
            });

        let mut copied = 0;
        for entry in walker {
            ctx.interrupt.check()?;
            let entry = entry?;
            let rel = entry
                .path()
                .strip_prefix(source_root)
                .map_err(|_| Error::custom(format!("{} escapes the project root", entry.path().display())))?;
            let destination = self.path.join(rel);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&destination)
                    .map_err(|e| Error::io("create directory", &destination, e))?;
            } else {
                if ctx.verbose {
                    println!("Copying {} to {}", entry.path().display(), destination.display());
                }
                fs::copy(entry.path(), &destination)
                    .map_err(|e| Error::io("copy", entry.path(), e))?;
                copied += 1;
            }
        }

        Ok(copied)
    }

    /// Remove the staging tree, reporting failure
    pub fn finalize(mut self) -> Result<()> {
        self.finalized = true;
        utils::remove_dir_if_exists(&self.path).map_err(|e| Error::cleanup(&self.path, e))?;
        Ok(())
    }
}

impl Drop for StagingTree {
    fn drop(&mut self) {
        if !self.finalized {
            let _ = utils::remove_dir_if_exists(&self.path);
        }
    }
}
