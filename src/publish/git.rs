//! [`WorkTree`] over a git checkout, driven through the `git` command line.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::worktree::{check_path, CommitId, Signature, WorkTree};
use crate::error::{Error, Result};
use crate::http::mask_secrets;

/// A git working tree on disk.
pub struct GitWorkTree {
    dir: PathBuf,
    /// Credentials that may appear in remote URLs and git output
    secrets: Vec<String>,
}

impl GitWorkTree {
    /// Use an existing checkout.
    pub fn open_dir(dir: &Path) -> Result<Self> {
        if !dir.join(".git").exists() {
            return Err(Error::Config(format!("{} is not a git working tree", dir.display())));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            secrets: Vec::new(),
        })
    }

    /// Clone `url` into `dir`. `secrets` are masked in every diagnostic.
    pub fn clone_remote(url: &str, dir: &Path, secrets: &[&str]) -> Result<Self> {
        let dir_arg = dir.to_string_lossy().into_owned();
        run_git(None, &["clone", "--depth", "1", url, &dir_arg], secrets)?;
        log::info!("Cloned {} into {}", mask_secrets(url, secrets), dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            secrets: secrets.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Add credentials to mask in diagnostics.
    pub fn with_secrets(mut self, secrets: &[&str]) -> Self {
        self.secrets.extend(secrets.iter().map(|s| s.to_string()));
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Push the current branch to `remote` (a name or URL).
    pub fn push(&self, remote: &str) -> Result<()> {
        self.git(&["push", remote, "HEAD"])?;
        log::info!("Pushed to {}", self.mask(remote));
        Ok(())
    }

    fn mask(&self, s: &str) -> String {
        let secrets: Vec<&str> = self.secrets.iter().map(String::as_str).collect();
        mask_secrets(s, &secrets)
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        let secrets: Vec<&str> = self.secrets.iter().map(String::as_str).collect();
        run_git(Some(&self.dir), args, &secrets)
    }
}

fn run_git(dir: Option<&Path>, args: &[&str], secrets: &[&str]) -> Result<String> {
    let mut command = Command::new("git");
    if let Some(dir) = dir {
        command.current_dir(dir);
    }
    command
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    run(command, args, secrets)
}

fn run(mut command: Command, args: &[&str], secrets: &[&str]) -> Result<String> {
    let shown = mask_secrets(&args.join(" "), secrets);
    log::debug!("git {}", shown);

    let output = command
        .output()
        .map_err(|e| Error::Command(format!("cannot run git {}: {}", shown, e)))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Command(format!(
            "git {} failed ({}): {}",
            shown,
            output.status,
            mask_secrets(stderr.trim(), secrets)
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

impl WorkTree for GitWorkTree {
    fn open(&self, path: &str) -> Result<Option<Vec<u8>>> {
        check_path(path)?;
        match fs::read(self.dir.join(path)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn create(&mut self, path: &str, contents: &[u8]) -> Result<()> {
        check_path(path)?;
        let target = self.dir.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, contents)?;
        Ok(())
    }

    fn stage(&mut self, path: &str) -> Result<()> {
        check_path(path)?;
        self.git(&["add", "--", path])?;
        Ok(())
    }

    fn commit(&mut self, message: &str, author: &Signature) -> Result<CommitId> {
        let date = author.when.to_rfc3339();
        let secrets: Vec<&str> = self.secrets.iter().map(String::as_str).collect();
        let args = ["commit", "--allow-empty", "--quiet", "-m", message];

        let mut command = Command::new("git");
        command
            .current_dir(&self.dir)
            .args(args)
            .env("GIT_AUTHOR_NAME", &author.name)
            .env("GIT_AUTHOR_EMAIL", &author.email)
            .env("GIT_AUTHOR_DATE", &date)
            .env("GIT_COMMITTER_NAME", &author.name)
            .env("GIT_COMMITTER_EMAIL", &author.email)
            .env("GIT_COMMITTER_DATE", &date)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        run(command, &args, &secrets)?;

        let head = self.git(&["rev-parse", "HEAD"])?;
        Ok(CommitId::new(head))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_open_requires_checkout() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(GitWorkTree::open_dir(tmp.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_commit_in_real_repository() {
        if !git_available() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        run_git(Some(tmp.path()), &["init", "--quiet"], &[]).unwrap();

        let mut tree = GitWorkTree::open_dir(tmp.path()).unwrap();
        assert_eq!(tree.open("aws.json").unwrap(), None);
        tree.create("aws.json", b"{}\n").unwrap();
        tree.stage("aws.json").unwrap();
        let id = tree
            .commit("update aws data", &Signature::now("ip-fetcher", "ip-fetcher@users.noreply.github.com"))
            .unwrap();
        assert_eq!(id.as_str().len(), 40);
        assert_eq!(tree.open("aws.json").unwrap().as_deref(), Some(&b"{}\n"[..]));

        let log = run_git(Some(tmp.path()), &["log", "--format=%an <%ae> %s"], &[]).unwrap();
        assert_eq!(log, "ip-fetcher <ip-fetcher@users.noreply.github.com> update aws data");
    }

    #[test]
    fn test_failure_masks_secrets() {
        if !git_available() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let url = "file:///nonexistent/x-access-token:hunter2@repo.git";
        let err = GitWorkTree::clone_remote(url, &tmp.path().join("out"), &["hunter2"])
            .err()
            .unwrap();
        assert!(!err.to_string().contains("hunter2"));
    }
}
