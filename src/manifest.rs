use crate::error::Error;
use crate::result::Result;
use crate::selector::Selector;
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

// Release configuration compiled into the binary
const RELEASE_TOML: &str = include_str!("../release.toml");

#[derive(Debug, Deserialize)]
pub struct ReleaseToml {
    pub release: ReleaseConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ReleaseConfig {
    pub title: String,

    #[serde(default)]
    pub filename: Option<String>,

    pub metadata: String,

    pub content: String,

    #[serde(rename = "output-folder", default)]
    pub output_folder: Option<String>,

    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Where the staging tree and the artifact are placed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLocation {
    ProjectRoot,
    Folder(PathBuf),
}

/// Parsed and validated release information
#[derive(Debug, Clone)]
pub struct Release {
    /// Display name, also the top-level folder inside the archive
    pub title: String,
    /// Artifact stem (`<filename>.zip`)
    pub filename: String,
    /// Metadata file copied into the archive folder root
    pub metadata: PathBuf,
    /// Content subtree, relative to the project root
    pub content: PathBuf,
    pub output: OutputLocation,
    pub selector: Selector,
}

impl Release {
    /// Load the release configuration embedded at compile time
    pub fn embedded() -> Result<Self> {
        Self::from_toml(RELEASE_TOML)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let release_toml: ReleaseToml = toml::from_str(content)?;
        Self::from_config(release_toml.release)
    }

    pub fn from_config(config: ReleaseConfig) -> Result<Self> {
        let title = config.title.trim().to_string();
        check_file_name("title", &title)?;

        let filename = config
            .filename
            .map(|f| f.trim().to_string())
            .unwrap_or_else(|| title.clone());
        check_file_name("filename", &filename)?;

        check_file_name("metadata", &config.metadata)?;
        let metadata = PathBuf::from(&config.metadata);

        let content = relative_path("content", &config.content)?;

        let output = match config.output_folder {
            Some(folder) => OutputLocation::Folder(relative_path("output-folder", &folder)?),
            None => OutputLocation::ProjectRoot,
        };

        let selector = Selector::new(&config.exclude)?;

        let release = Release {
            title,
            filename,
            metadata,
            content,
            output,
            selector,
        };
        release.check_layout()?;

        Ok(release)
    }

    /// Reject configurations whose output would land on top of project inputs
    fn check_layout(&self) -> Result<()> {
        if !self.selector.includes(&self.metadata, false) {
            return Err(Error::InvalidConfig(format!(
                "metadata file `{}` is excluded by the release rules",
                self.metadata.display()
            )));
        }

        let content_root = first_component(&self.content);
        if content_root == self.metadata.as_os_str() {
            return Err(Error::InvalidConfig(
                "content and metadata must not share a name".to_string(),
            ));
        }

        match &self.output {
            OutputLocation::ProjectRoot => {
                // staging tree sits next to the project inputs
                if content_root == self.title.as_str() || self.metadata.as_os_str() == self.title.as_str() {
                    return Err(Error::InvalidConfig(format!(
                        "title `{}` collides with a project input",
                        self.title
                    )));
                }
            }
            OutputLocation::Folder(folder) => {
                let output_root = first_component(folder);
                if output_root == content_root || output_root == self.metadata.as_os_str() {
                    return Err(Error::InvalidConfig(format!(
                        "output folder `{}` collides with a project input",
                        folder.display()
                    )));
                }
            }
        }

        Ok(())
    }
}

fn check_file_name(field: &str, name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(Error::InvalidConfig(format!(
            "`{}` must be a plain file name, got `{}`",
            field, name
        )));
    }
    Ok(())
}

fn relative_path(field: &str, value: &str) -> Result<PathBuf> {
    let path = PathBuf::from(value);
    let valid = !value.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        && path.components().any(|c| matches!(c, Component::Normal(_)));

    if !valid {
        return Err(Error::InvalidConfig(format!(
            "`{}` must be a relative path inside the project, got `{}`",
            field, value
        )));
    }

    Ok(path
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect())
}

fn first_component(path: &Path) -> &std::ffi::OsStr {
    path.components()
        .next()
        .map(|c| c.as_os_str())
        .unwrap_or_default()
}
