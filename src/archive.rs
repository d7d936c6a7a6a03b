use crate::context::Context;
use crate::error::Error;
use crate::result::Result;
use crate::selector::Selector;
use crate::utils;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Archive being written under a temporary name
///
/// The partial file is deleted on drop unless [`PendingArtifact::commit`]
/// moved it over the final artifact path.
pub struct PendingArtifact {
    partial: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl PendingArtifact {
    pub fn new(partial: PathBuf, target: PathBuf) -> Self {
        Self {
            partial,
            target,
            committed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.partial
    }

    /// Atomically move the finished archive into place
    pub fn commit(mut self) -> Result<PathBuf> {
        fs::rename(&self.partial, &self.target)
            .map_err(|e| Error::io("move archive into place at", &self.target, e))?;
        self.committed = true;
        Ok(self.target.clone())
    }
}

impl Drop for PendingArtifact {
    fn drop(&mut self) {
        if !self.committed {
            let _ = utils::remove_file_if_exists(&self.partial);
        }
    }
}

/// Compress `staging` into a zip at `output_path`
///
/// Entry names are relative to the parent of `staging`, so the archive holds
/// a single top-level folder. The selector is consulted again for every
/// entry (relative to `staging`) to keep anything the copy step let through
/// out of the archive. Returns the number of files written.
pub fn create_zip(
    ctx: &Context,
    staging: &Path,
    output_path: &Path,
    selector: &Selector,
) -> Result<usize> {
    let base = staging
        .parent()
        .ok_or_else(|| Error::custom(format!("{} has no parent", staging.display())))?;

    let file = File::create(output_path).map_err(|e| Error::io("create archive", output_path, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));

    let walker = WalkDir::new(staging)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || entry
                    .path()
                    .strip_prefix(staging)
                    .is_ok_and(|rel| selector.includes(rel, entry.file_type().is_dir()))
        });

    let mut written = 0;
    for entry in walker {
        ctx.interrupt.check()?;
        let entry = entry?;
        let path = entry.path();
        let name = path
            .strip_prefix(base)
            .map(utils::entry_name)
            .map_err(|_| Error::custom(format!("{} is outside {}", path.display(), base.display())))?;

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{}/", name), options(0o755))?;
        } else {
            if ctx.verbose {
                println!("Adding {}", name);
            }
            let metadata = entry.metadata()?;
            zip.start_file(name, options(file_mode(&metadata)))?;
            let mut f = File::open(path).map_err(|e| Error::io("read", path, e))?;
            io::copy(&mut f, &mut zip).map_err(|e| Error::io("compress", path, e))?;
            written += 1;
        }
    }

    let mut writer = zip.finish()?;
    writer
        .flush()
        .map_err(|e| Error::io("write archive", output_path, e))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| Error::io("sync archive", output_path, e))?;

    Ok(written)
}

fn options(mode: u32) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(mode)
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> u32 {
    0o644
}
