//! The on-disk repository layout: `.git/`, `.git/objects/`, `.git/refs/`,
//! and the fixed `HEAD` file. No index, no staging area, no config file —
//! those are explicitly out of scope.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::fs;
use crate::store::{ObjectStore, METADATA_DIR};

const DEFAULT_BRANCH: &str = "main";

pub struct Repository {
    root: PathBuf,
}

impl Repository {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn git_dir(&self) -> PathBuf {
        self.root.join(METADATA_DIR)
    }

    pub fn objects(&self) -> ObjectStore {
        ObjectStore::new(&self.root)
    }

    /// Creates the on-disk layout in `root`, which need not exist yet.
    /// `HEAD` always points at `refs/heads/main`; this core does not
    /// support arbitrary default branch names. `refs/` is created empty —
    /// no ref files are ever written under it; reference management beyond
    /// this fixed `HEAD` file is out of scope.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let git_dir = root.join(METADATA_DIR);

        fs::create_dir_all(&git_dir.join("refs"))?;
        fs::create_dir_all(&git_dir.join("objects"))?;
        fs::write_file(&git_dir.join("HEAD"), format!("ref: refs/heads/{}\n", DEFAULT_BRANCH).as_bytes())?;

        Ok(Self { root })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn init_creates_expected_layout() {
        let dir = tempdir().unwrap();
        let repo_root = dir.path().join("repo");

        let repo = Repository::init(&repo_root).unwrap();

        assert!(repo.git_dir().join("objects").is_dir());
        assert!(repo.git_dir().join("refs").is_dir());
        let head = std::fs::read_to_string(repo.git_dir().join("HEAD")).unwrap();
        assert_eq!(head, "ref: refs/heads/main\n");
    }

    #[test]
    fn init_leaves_refs_and_objects_empty() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path().join("repo")).unwrap();

        assert_eq!(std::fs::read_dir(repo.git_dir().join("refs")).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(repo.git_dir().join("objects")).unwrap().count(), 0);
    }
}
