use crate::archive::{self, PendingArtifact};
use crate::context::Context;
use crate::error::Error;
use crate::manifest::{OutputLocation, Release};
use crate::result::Result;
use crate::staging::StagingTree;
use crate::utils;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Output paths of a release build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub output_root: PathBuf,
    pub staging: PathBuf,
    pub artifact: PathBuf,
    pub partial: PathBuf,
}

impl Layout {
    pub fn new(project_root: &Path, release: &Release) -> Self {
        let output_root = match &release.output {
            OutputLocation::ProjectRoot => project_root.to_path_buf(),
            OutputLocation::Folder(folder) => project_root.join(folder),
        };

        Self {
            staging: output_root.join(&release.title),
            artifact: output_root.join(format!("{}.zip", release.filename)),
            partial: output_root.join(format!("{}.zip.partial", release.filename)),
            output_root,
        }
    }
}

/// Summary of a successful build
#[derive(Debug)]
pub struct BuildReport {
    pub artifact: PathBuf,
    pub staged: usize,
    pub archived: usize,
}

/// Package the project into `<filename>.zip`
///
/// Prepare, stage, archive and finalize run in order; the staging tree and
/// the partial archive are owned by guards, so an error at any step
/// (including Ctrl+C, polled between entries) leaves neither behind. The
/// previous artifact is removed during prepare, so a failed build leaves no
/// artifact at all.
pub fn build(ctx: &Context, release: &Release) -> Result<BuildReport> {
    build_with(ctx, release, |staging, output| {
        archive::create_zip(ctx, staging, output, &release.selector)
    })
}

/// [`build`] with the archive step supplied by the caller
fn build_with<F>(ctx: &Context, release: &Release, write_archive: F) -> Result<BuildReport>
where
    F: FnOnce(&Path, &Path) -> Result<usize>,
{
    let layout = Layout::new(&ctx.project_root, release);

    let metadata = ctx.project_root.join(&release.metadata);
    if !metadata.is_file() {
        return Err(Error::MissingInput(metadata));
    }

    // Prepare
    utils::ensure_dir(&layout.output_root)?;
    for stale in [&layout.artifact, &layout.partial] {
        utils::remove_file_if_exists(stale).map_err(|e| Error::cleanup(stale, e))?;
    }
    let staging = StagingTree::prepare(&layout.staging)?;

    // Stage
    staging.stage_file(ctx, &metadata)?;
    let staged = 1 + staging.stage_tree(ctx, &ctx.project_root, &release.content, &release.selector)?;

    // Archive
    let pending = PendingArtifact::new(layout.partial.clone(), layout.artifact.clone());
    let archived = write_archive(staging.path(), pending.path())?;

    // Finalize
    staging.finalize()?;
    ctx.interrupt.check()?;
    let artifact = pending.commit()?;

    Ok(BuildReport {
        artifact,
        staged,
        archived,
    })
}

/// Remove the artifact and any leftovers of an interrupted build
///
/// Absent targets are not an error. A dedicated output folder is removed
/// once it is empty. Returns the paths that were actually removed.
pub fn clean(ctx: &Context, release: &Release) -> Result<Vec<PathBuf>> {
    let layout = Layout::new(&ctx.project_root, release);
    let mut removed = Vec::new();

    for file in [&layout.artifact, &layout.partial] {
        if utils::remove_file_if_exists(file).map_err(|e| Error::cleanup(file, e))? {
            removed.push(file.clone());
        }
    }

    // anything other than a directory at the staging name was not left by a build
    if is_dir(&layout.staging)
        && utils::remove_dir_if_exists(&layout.staging).map_err(|e| Error::cleanup(&layout.staging, e))?
    {
        removed.push(layout.staging.clone());
    }

    if let OutputLocation::Folder(_) = release.output {
        if remove_empty_dir(&layout.output_root)? {
            removed.push(layout.output_root.clone());
        }
    }

    Ok(removed)
}

fn is_dir(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.is_dir())
}

fn remove_empty_dir(path: &Path) -> Result<bool> {
    let is_empty = match fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::cleanup(path, e)),
    };

    if !is_empty {
        return Ok(false);
    }

    fs::remove_dir(path).map_err(|e| Error::cleanup(path, e))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    const RELEASE: &str = r#"
        [release]
        title = "Product"
        metadata = "metadata.ini"
        content = "content"
        output-folder = "output"
        exclude = ["*.pyc", "__pycache__/", ".DS_Store", "RELEASE.ini", "RELEASE_*.ini"]
    "#;

    fn release() -> Release {
        Release::from_toml(RELEASE).unwrap()
    }

    fn write(root: &Path, rel: &str, body: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    /// Project tree from the packaging scenario
    fn scenario_project() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "metadata.ini", b"[info]\nname=Product\n");
        write(root, "content/app.py", b"print('hello')\n");
        write(root, "content/app.pyc", b"\x00\x01");
        write(root, "content/__pycache__/x.pyc", b"\x00\x02");
        write(root, "content/RELEASE.ini", b"[Versions]\n");
        tmp
    }

    fn file_entries(archive: &Path) -> Vec<String> {
        let zip = ZipArchive::new(File::open(archive).unwrap()).unwrap();
        let mut names: Vec<String> = zip
            .file_names()
            .filter(|n| !n.ends_with('/'))
            .map(String::from)
            .collect();
        names.sort();
        names
    }

    fn read_entry(archive: &Path, name: &str) -> Vec<u8> {
        let mut zip = ZipArchive::new(File::open(archive).unwrap()).unwrap();
        let mut entry = zip.by_name(name).unwrap();
        let mut body = Vec::new();
        entry.read_to_end(&mut body).unwrap();
        body
    }

    #[test]
    fn test_scenario_build() {
        let project = scenario_project();
        let ctx = Context::new(project.path().to_path_buf(), false);

        let report = build(&ctx, &release()).unwrap();

        assert_eq!(report.artifact, project.path().join("output").join("Product.zip"));
        assert_eq!(report.staged, 2);
        assert_eq!(report.archived, 2);
        assert_eq!(
            file_entries(&report.artifact),
            vec!["Product/content/app.py", "Product/metadata.ini"]
        );
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let project = scenario_project();
        let root = project.path();
        write(root, "content/lib/deep/util.py", b"def f():\n    return 1\n");
        write(root, "content/lib/.DS_Store", b"junk");
        write(root, "content/assets/logo.bin", &[0u8, 159, 146, 150, 255]);
        write(root, "content/include/apps/RELEASE_APPS.ini", b"[Versions]\n");

        let ctx = Context::new(root.to_path_buf(), false);
        let release = release();
        let report = build(&ctx, &release).unwrap();

        let expected = [
            "metadata.ini",
            "content/app.py",
            "content/assets/logo.bin",
            "content/lib/deep/util.py",
        ];
        let mut expected_names: Vec<String> =
            expected.iter().map(|rel| format!("Product/{}", rel)).collect();
        expected_names.sort();
        assert_eq!(file_entries(&report.artifact), expected_names);

        for rel in expected {
            assert_eq!(
                read_entry(&report.artifact, &format!("Product/{}", rel)),
                fs::read(root.join(rel)).unwrap(),
                "{}",
                rel
            );
        }
    }

    #[test]
    fn test_build_leaves_no_staging_or_partial() {
        let project = scenario_project();
        let ctx = Context::new(project.path().to_path_buf(), false);
        let release = release();
        build(&ctx, &release).unwrap();

        let layout = Layout::new(project.path(), &release);
        assert!(!layout.staging.exists());
        assert!(!layout.partial.exists());
        let remaining: Vec<_> = fs::read_dir(&layout.output_root).unwrap().collect();
        assert_eq!(remaining.len(), 1);
    }

    #[test]
    fn test_project_root_is_untouched() {
        let project = scenario_project();
        let ctx = Context::new(project.path().to_path_buf(), false);
        build(&ctx, &release()).unwrap();

        let root = project.path();
        assert!(root.join("content/app.pyc").is_file());
        assert!(root.join("content/__pycache__/x.pyc").is_file());
        assert!(root.join("content/RELEASE.ini").is_file());
    }

    #[test]
    fn test_rebuild_replaces_previous_artifact() {
        let project = scenario_project();
        let ctx = Context::new(project.path().to_path_buf(), false);
        let release = release();

        let first = build(&ctx, &release).unwrap();
        fs::remove_file(project.path().join("content/app.py")).unwrap();
        write(project.path(), "content/main.py", b"main\n");
        let second = build(&ctx, &release).unwrap();

        assert_eq!(first.artifact, second.artifact);
        assert_eq!(
            file_entries(&second.artifact),
            vec!["Product/content/main.py", "Product/metadata.ini"]
        );
        let zips: Vec<_> = fs::read_dir(project.path().join("output"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".zip"))
            .collect();
        assert_eq!(zips.len(), 1);
    }

    #[test]
    fn test_stale_staging_is_not_merged() {
        let project = scenario_project();
        let release = release();
        let layout = Layout::new(project.path(), &release);
        write(&layout.staging, "content/leftover.py", b"stale");

        let ctx = Context::new(project.path().to_path_buf(), false);
        let report = build(&ctx, &release).unwrap();

        assert!(!file_entries(&report.artifact).contains(&"Product/content/leftover.py".to_string()));
    }

    #[test]
    fn test_missing_content_fails_without_leftovers() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "metadata.ini", b"meta");
        let release = release();
        let layout = Layout::new(tmp.path(), &release);
        write(&layout.output_root, "Product.zip", b"previous build");

        let ctx = Context::new(tmp.path().to_path_buf(), false);
        let err = build(&ctx, &release).unwrap_err();

        assert!(matches!(err, Error::Io { .. }));
        assert!(!layout.staging.exists());
        assert!(!layout.partial.exists());
        assert!(!layout.artifact.exists());
    }

    #[test]
    fn test_missing_metadata_fails_before_prepare() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "content/app.py", b"");
        let ctx = Context::new(tmp.path().to_path_buf(), false);

        let err = build(&ctx, &release()).unwrap_err();

        assert!(matches!(err, Error::MissingInput(_)));
        assert!(!tmp.path().join("output").exists());
    }

    #[test]
    fn test_unremovable_stale_staging_fails_fast() {
        let project = scenario_project();
        let release = release();
        let layout = Layout::new(project.path(), &release);
        write(&layout.output_root, "Product", b"not a staging tree");

        let ctx = Context::new(project.path().to_path_buf(), false);
        let err = build(&ctx, &release).unwrap_err();

        assert!(matches!(err, Error::Cleanup { .. }));
        assert_eq!(fs::read(&layout.staging).unwrap(), b"not a staging tree");
        assert!(!layout.artifact.exists());
        assert!(!layout.partial.exists());
    }

    #[test]
    fn test_archive_failure_removes_staging() {
        let project = scenario_project();
        let release = release();
        let layout = Layout::new(project.path(), &release);
        let ctx = Context::new(project.path().to_path_buf(), false);

        let err = build_with(&ctx, &release, |staging, output| {
            assert!(staging.join("content").join("app.py").is_file());
            fs::write(output, b"half written").unwrap();
            Err(Error::io("write archive", output, io::Error::other("disk full")))
        })
        .unwrap_err();

        assert!(matches!(err, Error::Io { op: "write archive", .. }));
        assert!(!layout.staging.exists());
        assert!(!layout.partial.exists());
        assert!(!layout.artifact.exists());
    }

    #[test]
    fn test_interrupted_build_leaves_no_leftovers() {
        let project = scenario_project();
        let release = release();
        let layout = Layout::new(project.path(), &release);
        let ctx = Context::new(project.path().to_path_buf(), false);

        // raised while the archive is being written
        let err = build_with(&ctx, &release, |staging, output| {
            fs::write(output, b"partial").unwrap();
            ctx.interrupt.trigger();
            archive::create_zip(&ctx, staging, output, &release.selector)
        })
        .unwrap_err();

        assert!(matches!(err, Error::Interrupted));
        assert!(!layout.staging.exists());
        assert!(!layout.partial.exists());
        assert!(!layout.artifact.exists());
    }

    #[test]
    fn test_interrupt_after_archive_is_not_committed() {
        let project = scenario_project();
        let release = release();
        let layout = Layout::new(project.path(), &release);
        let ctx = Context::new(project.path().to_path_buf(), false);

        let err = build_with(&ctx, &release, |staging, output| {
            let written = archive::create_zip(&ctx, staging, output, &release.selector)?;
            ctx.interrupt.trigger();
            Ok(written)
        })
        .unwrap_err();

        assert!(matches!(err, Error::Interrupted));
        assert!(!layout.staging.exists());
        assert!(!layout.partial.exists());
        assert!(!layout.artifact.exists());
    }

    #[test]
    fn test_clean_ignores_file_at_staging_name() {
        let project = scenario_project();
        let release = release();
        let layout = Layout::new(project.path(), &release);
        let ctx = Context::new(project.path().to_path_buf(), false);
        write(&layout.output_root, "Product", b"x");

        assert!(clean(&ctx, &release).unwrap().is_empty());
        assert!(layout.staging.is_file());
    }

    #[test]
    fn test_project_root_output_variant() {
        let project = scenario_project();
        let release = Release::from_toml(&RELEASE.replace("output-folder = \"output\"\n", "")).unwrap();
        let ctx = Context::new(project.path().to_path_buf(), false);

        let report = build(&ctx, &release).unwrap();
        assert_eq!(report.artifact, project.path().join("Product.zip"));
        assert!(!project.path().join("Product").exists());

        let removed = clean(&ctx, &release).unwrap();
        assert_eq!(removed, vec![project.path().join("Product.zip")]);
        assert!(project.path().join("metadata.ini").is_file());
        assert!(project.path().join("content").is_dir());
    }

    #[test]
    fn test_clean_removes_outputs() {
        let project = scenario_project();
        let ctx = Context::new(project.path().to_path_buf(), false);
        let release = release();
        let layout = Layout::new(project.path(), &release);

        build(&ctx, &release).unwrap();
        write(&layout.staging, "content/interrupted.py", b"");

        let removed = clean(&ctx, &release).unwrap();
        assert_eq!(
            removed,
            vec![layout.artifact.clone(), layout.staging.clone(), layout.output_root.clone()]
        );
        assert!(!layout.output_root.exists());
        assert!(project.path().join("content/app.py").is_file());
    }

    #[test]
    fn test_clean_is_idempotent() {
        let project = scenario_project();
        let ctx = Context::new(project.path().to_path_buf(), false);
        let release = release();

        build(&ctx, &release).unwrap();
        clean(&ctx, &release).unwrap();
        let after_first: Vec<_> = fs::read_dir(project.path()).unwrap().map(|e| e.unwrap().path()).collect();

        assert!(clean(&ctx, &release).unwrap().is_empty());
        let after_second: Vec<_> = fs::read_dir(project.path()).unwrap().map(|e| e.unwrap().path()).collect();
        assert_eq!(after_first.len(), after_second.len());
    }

    #[test]
    fn test_clean_keeps_foreign_files_in_output() {
        let project = scenario_project();
        let ctx = Context::new(project.path().to_path_buf(), false);
        let release = release();
        write(project.path(), "output/notes.txt", b"keep");

        build(&ctx, &release).unwrap();
        clean(&ctx, &release).unwrap();

        assert!(project.path().join("output/notes.txt").is_file());
    }
}
