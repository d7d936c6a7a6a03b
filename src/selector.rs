//! Exclusion rules deciding which project paths ship in a release.
//!
//! Patterns are matched against the trailing components of a path relative
//! to the project root:
//!
//! * `RELEASE.ini` matches that exact name at any depth
//! * `*.pyc` / `._*` / `RELEASE_*.ini` match names by suffix, prefix or both
//! * `__pycache__/` (trailing slash) matches directories only
//! * `include/cache` (multi-component) matches a path suffix
//!
//! A path is also excluded when any of its ancestors is matched, so the
//! answer does not depend on the walker having pruned the parent first.

use crate::error::Error;
use crate::result::Result;
use std::path::{Component, Path};

/// Outcome of classifying a single path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Include,
    /// Matched file (or a path beneath a matched directory)
    Exclude,
    /// Matched directory, the walker must not descend into it
    Prune,
}

impl Verdict {
    pub fn is_include(self) -> bool {
        self == Verdict::Include
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Prefix(String),
    Suffix(String),
    Affix(String, String),
    Any,
}

impl Segment {
    fn parse(component: &str) -> Self {
        match component.split_once('*') {
            None => Segment::Literal(component.to_string()),
            Some(("", "")) => Segment::Any,
            Some(("", suffix)) => Segment::Suffix(suffix.to_string()),
            Some((prefix, "")) => Segment::Prefix(prefix.to_string()),
            Some((prefix, suffix)) => Segment::Affix(prefix.to_string(), suffix.to_string()),
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            Segment::Literal(literal) => name == literal,
            Segment::Prefix(prefix) => name.starts_with(prefix.as_str()),
            Segment::Suffix(suffix) => name.ends_with(suffix.as_str()),
            Segment::Affix(prefix, suffix) => {
                name.len() >= prefix.len() + suffix.len()
                    && name.starts_with(prefix.as_str())
                    && name.ends_with(suffix.as_str())
            }
            Segment::Any => true,
        }
    }
}

/// A single compiled exclusion rule
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
    dir_only: bool,
}

impl Pattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(Error::pattern(pattern, "pattern is empty"));
        }
        if pattern.starts_with('/') {
            return Err(Error::pattern(pattern, "pattern must be relative"));
        }
        if let Some(c) = pattern.chars().find(|c| matches!(*c, '?' | '[' | ']' | '\\')) {
            return Err(Error::pattern(
                pattern,
                format!("unsupported glob syntax `{}`", c),
            ));
        }

        let dir_only = pattern.ends_with('/');
        let body = pattern.strip_suffix('/').unwrap_or(pattern);

        let mut segments = Vec::new();
        for component in body.split('/') {
            if component.is_empty() {
                return Err(Error::pattern(pattern, "empty path component"));
            }
            if component == "." || component == ".." {
                return Err(Error::pattern(pattern, "relative components are not allowed"));
            }
            if component.contains("**") {
                return Err(Error::pattern(pattern, "recursive wildcards are not supported"));
            }
            if component.matches('*').count() > 1 {
                return Err(Error::pattern(pattern, "at most one `*` per component"));
            }
            segments.push(Segment::parse(component));
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
            dir_only,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match against the trailing components of `components`
    fn matches(&self, components: &[String], is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }
        if components.len() < self.segments.len() {
            return false;
        }

        let start = components.len() - self.segments.len();
        self.segments
            .iter()
            .zip(&components[start..])
            .all(|(segment, name)| segment.matches(name))
    }
}

/// Ordered exclusion rule set with a default-allow policy
#[derive(Debug, Clone, Default)]
pub struct Selector {
    patterns: Vec<Pattern>,
}

impl Selector {
    /// Compile a rule set, failing on the first malformed pattern
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Pattern::parse(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Classify `path` (relative to the project root)
    pub fn verdict(&self, path: &Path, is_dir: bool) -> Verdict {
        let components: Vec<String> = path
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        for end in 1..=components.len() {
            let is_last = end == components.len();
            let prefix_is_dir = !is_last || is_dir;
            let prefix = &components[..end];

            if self.patterns.iter().any(|p| p.matches(prefix, prefix_is_dir)) {
                return if is_last && is_dir {
                    Verdict::Prune
                } else {
                    Verdict::Exclude
                };
            }
        }

        Verdict::Include
    }

    pub fn includes(&self, path: &Path, is_dir: bool) -> bool {
        self.verdict(path, is_dir).is_include()
    }
}
