//! Orchestrates a clone: ref discovery, pack fetch, decode, and working-tree
//! materialization. Mirrors the reference implementation's clone pipeline
//! step for step, including its choice not to roll back a partially created
//! repository directory if a later step fails.

use std::path::Path;

use crate::error::Result;
use crate::hash::Hash;
use crate::packfile;
use crate::repository::Repository;
use crate::store::commit_tree_hash;
use crate::transport;
use crate::wire;

/// Clones `url` (a smart-HTTP base URL, without a trailing `/info/refs`)
/// into `dest`, which is created if it doesn't exist. Returns the digest of
/// the commit that `HEAD` pointed to on the remote.
///
/// This core does not manage refs beyond the fixed `HEAD` file `init`
/// writes: the fetched commit is decoded and checked out, but no
/// `refs/heads/main` file is ever written.
pub fn clone(url: &str, dest: &Path) -> Result<Hash> {
    let repo = Repository::init(dest)?;
    let store = repo.objects();

    log::debug!("fetching refs from {}", url);
    let advertisement = transport::get_refs(url)?;
    let head = wire::extract_head(&advertisement)?;
    log::debug!("remote HEAD is {}", head);

    let want_request = wire::build_want_request(&head);
    let raw_response = transport::post_upload_pack(url, want_request)?;
    let pack = wire::demux_sideband(&raw_response)?;

    let objects = packfile::unpack(&pack, &store)?;
    log::debug!("unpacked {} objects", objects.len());

    let commit = store.read(&head)?;
    let tree = commit_tree_hash(commit.body())?;

    store.materialize(&tree, dest)?;

    Ok(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_rejects_unreachable_host() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("repo");
        let result = clone("http://127.0.0.1.invalid.example/repo", &dest);
        assert!(result.is_err());
    }
}
