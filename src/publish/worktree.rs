//! Working-tree abstraction the synchronizer writes through.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path};

use crate::error::{Error, Result};
use crate::timestamp::Timestamp;

/// Hex commit identifier. The all-zero id means "no commit".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitId(String);

impl CommitId {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Id returned when nothing changed.
    pub fn zero() -> Self {
        Self("0".repeat(40))
    }

    pub fn is_zero(&self) -> bool {
        self.0.bytes().all(|b| b == b'0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Commit author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub when: Timestamp,
}

impl Signature {
    /// Signature stamped with the current time.
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            when: Utc::now().into(),
        }
    }
}

/// A commit as recorded by [`MemoryWorkTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub id: CommitId,
    pub parent: Option<CommitId>,
    pub message: String,
    pub author: Signature,
    pub paths: Vec<String>,
}

/// Minimal revision-controlled tree: read, write, stage, commit.
///
/// Paths are relative and use `/` separators.
pub trait WorkTree {
    /// Current contents of `path`, or `None` when it does not exist.
    fn open(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Write `path`, replacing any existing contents.
    fn create(&mut self, path: &str, contents: &[u8]) -> Result<()>;

    fn stage(&mut self, path: &str) -> Result<()>;

    /// Commit everything staged.
    fn commit(&mut self, message: &str, author: &Signature) -> Result<CommitId>;
}

/// Reject absolute paths and paths leaving the tree.
pub(crate) fn check_path(path: &str) -> Result<()> {
    let ok = !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if ok {
        Ok(())
    } else {
        Err(Error::Config(format!("invalid working tree path {:?}", path)))
    }
}

/// In-memory tree used by tests.
#[derive(Debug, Default)]
pub struct MemoryWorkTree {
    files: BTreeMap<String, Vec<u8>>,
    staged: BTreeMap<String, Vec<u8>>,
    commits: Vec<CommitRecord>,
}

impl MemoryWorkTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits in creation order.
    pub fn commits(&self) -> &[CommitRecord] {
        &self.commits
    }

    pub fn head(&self) -> Option<&CommitId> {
        self.commits.last().map(|c| &c.id)
    }
}

impl WorkTree for MemoryWorkTree {
    fn open(&self, path: &str) -> Result<Option<Vec<u8>>> {
        check_path(path)?;
        Ok(self.files.get(path).cloned())
    }

    fn create(&mut self, path: &str, contents: &[u8]) -> Result<()> {
        check_path(path)?;
        self.files.insert(path.to_string(), contents.to_vec());
        Ok(())
    }

    fn stage(&mut self, path: &str) -> Result<()> {
        check_path(path)?;
        let contents = self
            .files
            .get(path)
            .ok_or_else(|| Error::Command(format!("pathspec {:?} did not match any files", path)))?;
        self.staged.insert(path.to_string(), contents.clone());
        Ok(())
    }

    fn commit(&mut self, message: &str, author: &Signature) -> Result<CommitId> {
        if self.staged.is_empty() {
            return Err(Error::Command("nothing to commit".to_string()));
        }

        let parent = self.head().cloned();
        let mut hasher = Sha256::new();
        if let Some(parent) = &parent {
            hasher.update(parent.as_str().as_bytes());
        }
        hasher.update(message.as_bytes());
        for (path, contents) in &self.staged {
            hasher.update(path.as_bytes());
            hasher.update(contents);
        }
        let id = CommitId::new(hex::encode(hasher.finalize()));

        let staged = std::mem::take(&mut self.staged);
        self.commits.push(CommitRecord {
            id: id.clone(),
            parent,
            message: message.to_string(),
            author: author.clone(),
            paths: staged.into_keys().collect(),
        });
        Ok(id)
    }
}
