// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::EventKind;

use crate::errors::Result;

/// Decides which changed paths concern one watched folder.
///
/// A path matches when it lies under `root`, outside every ignored folder,
/// and none of the exclude globs match its root-relative form (e.g.
/// `"components/App.js"`).
#[derive(Clone)]
pub struct ChangeFilter {
    root: PathBuf,
    exclude: Option<GlobSet>,
    ignored: Vec<PathBuf>,
}

impl fmt::Debug for ChangeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeFilter")
            .field("root", &self.root)
            .field("ignored", &self.ignored)
            .finish_non_exhaustive()
    }
}

impl ChangeFilter {
    pub fn new(root: impl Into<PathBuf>, exclude: &[String]) -> Result<Self> {
        let root = root.into();
        let exclude = if exclude.is_empty() {
            None
        } else {
            Some(
                build_globset(exclude)
                    .with_context(|| format!("building exclude globset for {:?}", root))?,
            )
        };
        Ok(Self {
            root,
            exclude,
            ignored: Vec::new(),
        })
    }

    /// Never match anything below `folder`, e.g. build output written inside
    /// the watched tree.
    pub fn ignoring(mut self, folder: impl Into<PathBuf>) -> Self {
        let folder = folder.into();
        if let Ok(canonical) = folder.canonicalize() {
            if canonical != folder {
                self.ignored.push(canonical);
            }
        }
        self.ignored.push(folder);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn matches(&self, path: &Path) -> bool {
        // Creating an ignored folder also reports its missing parents.
        if self
            .ignored
            .iter()
            .any(|folder| path.starts_with(folder) || folder.starts_with(path))
        {
            return false;
        }
        let Some(rel) = relative_str(&self.root, path) else {
            return false;
        };
        match &self.exclude {
            Some(exclude) => !exclude.is_match(&rel),
            None => true,
        }
    }
}

/// Access events (reads, opens) never count as changes.
pub fn is_relevant(kind: &EventKind) -> bool {
    !matches!(kind, EventKind::Access(_))
}

pub fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// `path` relative to `root` with forward slashes, retrying on canonical
/// forms (symlinked temp folders on macOS report `/private/var/...`).
fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }
    let root = root.canonicalize().ok()?;
    let rel = match path.canonicalize() {
        Ok(path) => path.strip_prefix(&root).ok()?.to_path_buf(),
        // Removed files cannot be canonicalized; try their parent.
        Err(_) => {
            let parent = path.parent()?.canonicalize().ok()?;
            parent.strip_prefix(&root).ok()?.join(path.file_name()?)
        }
    };
    Some(rel.to_string_lossy().replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn excludes() -> Vec<String> {
        vec!["**/node_modules/**".to_string(), "**/*.tmp".to_string()]
    }

    #[test]
    fn matches_paths_under_root_only() {
        let filter = ChangeFilter::new("/apps/web/src", &excludes()).unwrap();

        assert!(filter.matches(Path::new("/apps/web/src/index.js")));
        assert!(filter.matches(Path::new("/apps/web/src/components/App.js")));
        assert!(!filter.matches(Path::new("/apps/api/src/index.js")));
    }

    #[test]
    fn excluded_paths_do_not_match() {
        let filter = ChangeFilter::new("/apps/web/src", &excludes()).unwrap();

        assert!(!filter.matches(Path::new("/apps/web/src/node_modules/react/index.js")));
        assert!(!filter.matches(Path::new("/apps/web/src/cache/x.tmp")));
    }

    #[test]
    fn ignored_folders_do_not_match() {
        let filter = ChangeFilter::new("/apps/web/client/.", &[])
            .unwrap()
            .ignoring("/apps/web/client/build/development/")
            .ignoring("/apps/web/client/.tmp");

        assert!(filter.matches(Path::new("/apps/web/client/index.js")));
        assert!(filter.matches(Path::new("/apps/web/client/build.js")));
        assert!(!filter.matches(Path::new("/apps/web/client/build/development/main.js")));
        assert!(!filter.matches(Path::new("/apps/web/client/build")));
        assert!(!filter.matches(Path::new("/apps/web/client/.tmp/web/client/cache/x")));
    }

    #[test]
    fn invalid_glob_is_an_error() {
        assert!(ChangeFilter::new("/apps", &["a/[".to_string()]).is_err());
    }

    #[test]
    fn access_events_are_ignored() {
        use notify::event::{AccessKind, CreateKind};
        assert!(!is_relevant(&EventKind::Access(AccessKind::Any)));
        assert!(is_relevant(&EventKind::Create(CreateKind::File)));
    }
}
