//! Publishing provider files into a revision-controlled working tree.
//!
//! The [`Publisher`] runs [`synchronize`] for each provider in order, logs
//! and skips failures, then commits a fresh index listing every provider
//! that ran as the last commit.
//!
//! # Example
//!
//! ```ignore
//! use ip_fetcher::publish::{MemoryWorkTree, Publisher};
//!
//! let mut tree = MemoryWorkTree::new();
//! let report = Publisher::new(providers).run(&mut tree)?;
//! println!("{} files updated", report.updated().count());
//! ```

mod git;
mod index;
mod sync;
mod worktree;

pub use git::GitWorkTree;
pub use index::{index_rows, render_index, INDEX_COMMIT_MESSAGE, INDEX_FILENAME};
pub use sync::{commit_message, sync_bytes, synchronize};
pub use worktree::{CommitId, CommitRecord, MemoryWorkTree, Signature, WorkTree};

use std::path::Path;

use crate::config::{DEFAULT_AUTHOR_EMAIL, DEFAULT_AUTHOR_NAME};
use crate::error::{Error, Result};
use crate::provider::{Descriptor, Provider};

/// Outcome for one provider.
#[derive(Debug)]
pub struct ProviderOutcome {
    pub short_name: &'static str,
    /// Commit created, or the zero id when unchanged
    pub result: Result<CommitId>,
}

/// Summary of a publisher run.
#[derive(Debug)]
pub struct PublishReport {
    pub outcomes: Vec<ProviderOutcome>,
    pub index_commit: CommitId,
}

impl PublishReport {
    /// Providers that produced a new commit.
    pub fn updated(&self) -> impl Iterator<Item = &ProviderOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(&o.result, Ok(id) if !id.is_zero()))
    }

    pub fn failed(&self) -> impl Iterator<Item = &ProviderOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

/// Sequential synchronizer over a fixed provider list.
pub struct Publisher {
    providers: Vec<Box<dyn Provider>>,
    author_name: String,
    author_email: String,
}

impl Publisher {
    pub fn new(providers: Vec<Box<dyn Provider>>) -> Self {
        Self {
            providers,
            author_name: DEFAULT_AUTHOR_NAME.to_string(),
            author_email: DEFAULT_AUTHOR_EMAIL.to_string(),
        }
    }

    /// Override the commit identity.
    pub fn with_author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author_name = name.into();
        self.author_email = email.into();
        self
    }

    fn signature(&self) -> Signature {
        Signature::now(self.author_name.clone(), self.author_email.clone())
    }

    /// Synchronize every provider, then commit the index.
    ///
    /// Provider failures are recorded in the report. Only a failure to
    /// commit the index fails the run.
    pub fn run(&self, tree: &mut dyn WorkTree) -> Result<PublishReport> {
        let mut outcomes = Vec::with_capacity(self.providers.len());
        // Every provider that ran is indexed, committed or not
        let mut ran: Vec<&'static Descriptor> = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let descriptor = provider.descriptor();
            let result = synchronize(tree, provider.as_ref(), &self.signature());
            match &result {
                Ok(id) if id.is_zero() => log::info!("{}: no change", descriptor.short_name),
                Ok(id) => log::info!("{}: committed {}", descriptor.short_name, id),
                Err(e) => log::warn!("{}: {}", descriptor.short_name, e),
            }
            ran.push(descriptor);
            outcomes.push(ProviderOutcome {
                short_name: descriptor.short_name,
                result,
            });
        }

        let signature = self.signature();
        let index = render_index(&ran, &signature.when);
        tree.create(INDEX_FILENAME, index.as_bytes())?;
        tree.stage(INDEX_FILENAME)?;
        let index_commit = tree.commit(INDEX_COMMIT_MESSAGE, &signature)?;

        let report = PublishReport { outcomes, index_commit };
        log::info!(
            "Published {} providers: {} updated, {} failed",
            report.outcomes.len(),
            report.updated().count(),
            report.failed().count()
        );
        Ok(report)
    }
}

/// Clone the publish remote into `dir` unless it already holds a checkout.
pub fn prepare_worktree(dir: &Path, remote_url: Option<&str>, secrets: &[&str]) -> Result<GitWorkTree> {
    if dir.join(".git").exists() {
        return Ok(GitWorkTree::open_dir(dir)?.with_secrets(secrets));
    }
    let url = remote_url.ok_or_else(|| {
        Error::Config(format!(
            "{} is not a git working tree and no remote URL is configured",
            dir.display()
        ))
    })?;
    GitWorkTree::clone_remote(url, dir, secrets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::mock_transport;
    use crate::http::HttpClient;
    use crate::provider::{keyless, testing::mock_client};
    use std::sync::Arc;

    fn fixture_provider(name: &str) -> Box<dyn Provider> {
        let (_, base) = mock_client();
        let client = HttpClient::with_transport(Arc::new(mock_transport(name).unwrap()), base.config().clone());
        keyless(name, &client).unwrap()
    }

    #[test]
    fn test_run_commits_providers_then_index() {
        let publisher = Publisher::new(vec![fixture_provider("aws"), fixture_provider("oci")]);
        let mut tree = MemoryWorkTree::new();
        let report = publisher.run(&mut tree).unwrap();

        let messages: Vec<&str> = tree.commits().iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, vec!["update aws data", "update oci data", "update index"]);
        assert_eq!(report.updated().count(), 2);
        assert_eq!(tree.head(), Some(&report.index_commit));

        let index = String::from_utf8(tree.open(INDEX_FILENAME).unwrap().unwrap()).unwrap();
        assert!(index.contains("| [aws.json](aws.json) |"));
        assert!(index.contains("| [oci.json](oci.json) |"));
    }

    #[test]
    fn test_failure_does_not_stop_run() {
        let (_, offline) = mock_client();
        let broken = keyless("fastly", &offline).unwrap();
        let publisher = Publisher::new(vec![broken, fixture_provider("zscaler")]);
        let mut tree = MemoryWorkTree::new();
        let report = publisher.run(&mut tree).unwrap();

        assert_eq!(report.failed().count(), 1);
        assert_eq!(report.failed().next().unwrap().short_name, "fastly");
        assert_eq!(report.updated().count(), 1);

        let index = String::from_utf8(tree.open(INDEX_FILENAME).unwrap().unwrap()).unwrap();
        // a failed provider keeps its row so the previously published file stays linked
        assert!(index.contains("| [fastly.json](fastly.json) |"));
        assert!(index.contains("zscaler.json"));
        assert!(tree.open("fastly.json").unwrap().is_none());
    }

    #[test]
    fn test_second_run_only_commits_index() {
        let publisher = Publisher::new(vec![fixture_provider("github")]).with_author("bot", "bot@example.com");
        let mut tree = MemoryWorkTree::new();
        publisher.run(&mut tree).unwrap();
        let report = publisher.run(&mut tree).unwrap();

        assert_eq!(report.updated().count(), 0);
        assert_eq!(tree.commits().len(), 3);
        assert_eq!(tree.commits()[2].message, INDEX_COMMIT_MESSAGE);
        assert_eq!(tree.commits()[2].author.name, "bot");
    }

    #[test]
    fn test_prepare_requires_remote() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(prepare_worktree(tmp.path(), None, &[]), Err(Error::Config(_))));
    }
}
