//! Content-addressed synchronization of one provider into a working tree.

use sha2::{Digest, Sha256};

use super::worktree::{CommitId, Signature, WorkTree};
use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::render::render;

/// Commit message for a provider update.
pub fn commit_message(short_name: &str) -> String {
    format!("update {} data", short_name)
}

/// Fetch `provider`, render its default format and commit the result under
/// its conventional filename if the bytes changed.
///
/// Returns [`CommitId::zero`] when the stored file already matches.
pub fn synchronize(tree: &mut dyn WorkTree, provider: &dyn Provider, author: &Signature) -> Result<CommitId> {
    let descriptor = provider.descriptor();
    let filename = descriptor.filename.ok_or_else(|| {
        Error::Unsupported(format!("{} has no conventional file name", descriptor.short_name))
    })?;

    let document = provider.fetch()?;
    let bytes = render(&document, descriptor.default_format)?;
    sync_bytes(tree, filename, &bytes, &commit_message(descriptor.short_name), author)
}

/// Commit `bytes` at `path` unless the stored contents hash the same.
pub fn sync_bytes(
    tree: &mut dyn WorkTree,
    path: &str,
    bytes: &[u8],
    message: &str,
    author: &Signature,
) -> Result<CommitId> {
    if let Some(existing) = tree.open(path)? {
        if Sha256::digest(&existing) == Sha256::digest(bytes) {
            log::debug!("{} unchanged", path);
            return Ok(CommitId::zero());
        }
    }

    tree.create(path, bytes)?;
    tree.stage(path)?;
    let id = tree.commit(message, author)?;
    log::info!("Committed {} ({} bytes) as {}", path, bytes.len(), id);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::{mock_client, ok};
    use crate::provider::{keyless, CLOUDFLARE_IPV4_URL, CLOUDFLARE_IPV6_URL};
    use crate::publish::MemoryWorkTree;

    fn author() -> Signature {
        Signature::now("ip-fetcher", "ip-fetcher@users.noreply.github.com")
    }

    #[test]
    fn test_sync_bytes_skips_identical_content() {
        let mut tree = MemoryWorkTree::new();
        let first = sync_bytes(&mut tree, "a.txt", b"x\n", "m", &author()).unwrap();
        assert!(!first.is_zero());
        let second = sync_bytes(&mut tree, "a.txt", b"x\n", "m", &author()).unwrap();
        assert!(second.is_zero());
        let third = sync_bytes(&mut tree, "a.txt", b"y\n", "m", &author()).unwrap();
        assert!(!third.is_zero());
        assert_eq!(tree.commits().len(), 2);
    }

    #[test]
    fn test_synchronize_cloudflare() {
        let (mock, client) = mock_client();
        mock.route(CLOUDFLARE_IPV4_URL, ok(b"162.158.0.0/16\n"));
        mock.route(CLOUDFLARE_IPV6_URL, ok(b"2606:4700::/32\n"));
        let provider = keyless("cloudflare", &client).unwrap();

        let mut tree = MemoryWorkTree::new();
        let id = synchronize(&mut tree, provider.as_ref(), &author()).unwrap();
        assert!(!id.is_zero());
        assert_eq!(
            tree.open("cloudflare.txt").unwrap().as_deref(),
            Some(&b"162.158.0.0/16\n2606:4700::/32\n"[..])
        );
        assert_eq!(tree.commits()[0].message, "update cloudflare data");

        assert!(synchronize(&mut tree, provider.as_ref(), &author()).unwrap().is_zero());
        assert_eq!(tree.commits().len(), 1);
    }

    #[test]
    fn test_fetch_failure_leaves_tree_untouched() {
        let (_, client) = mock_client();
        let provider = keyless("aws", &client).unwrap();
        let mut tree = MemoryWorkTree::new();
        assert!(synchronize(&mut tree, provider.as_ref(), &author()).is_err());
        assert!(tree.commits().is_empty());
        assert_eq!(tree.open("aws.json").unwrap(), None);
    }
}
