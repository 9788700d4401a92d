//! The object store: content-addressed persistence of blobs, trees, commits
//! and tags under `<root>/objects/<hh>/<38 remaining hex chars>`.

use core::fmt;
use core::str::from_utf8;
use std::path::{Path, PathBuf};

use crate::compress;
use crate::error::{Error, Result};
use crate::fs;
use crate::hash::Hash;

/// The metadata directory name this core always uses (mirrors the widely
/// deployed tool's convention); tree construction skips it when scanning a
/// working directory.
pub const METADATA_DIR: &str = ".git";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ObjectType {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl ObjectType {
    fn name(self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Tree => "tree",
            Self::Blob => "blob",
            Self::Tag => "tag",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "commit" => Some(Self::Commit),
            "tree" => Some(Self::Tree),
            "blob" => Some(Self::Blob),
            "tag" => Some(Self::Tag),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Builds the canonical `<type> <len>\0<payload>` representation used both
/// for hashing and for the on-disk (pre-compression) form.
pub fn build_canonical(obj_type: ObjectType, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 16);
    out.extend_from_slice(obj_type.name().as_bytes());
    out.push(b' ');
    out.extend_from_slice(payload.len().to_string().as_bytes());
    out.push(0);
    out.extend_from_slice(payload);
    out
}

/// An object read back from the store: owns the full decompressed buffer
/// and exposes the body (everything past the header's NUL) by reference.
pub struct ReadObject {
    buffer: Vec<u8>,
    body_start: usize,
    obj_type: ObjectType,
}

impl ReadObject {
    pub fn obj_type(&self) -> ObjectType {
        self.obj_type
    }

    pub fn body(&self) -> &[u8] {
        &self.buffer[self.body_start..]
    }
}

pub struct ObjectStore {
    objects_dir: PathBuf,
}

impl ObjectStore {
    pub fn new(repo_root: &Path) -> Self {
        Self { objects_dir: repo_root.join(METADATA_DIR).join("objects") }
    }

    fn path_for(&self, hash: &Hash) -> PathBuf {
        let hex = hash.to_string();
        self.objects_dir.join(&hex[0..2]).join(&hex[2..])
    }

    /// Reads and decompresses an object, validating header and declared size.
    pub fn read(&self, hash: &Hash) -> Result<ReadObject> {
        let path = self.path_for(hash);
        if !path.is_file() {
            return Err(Error::NotFound(*hash));
        }

        let compressed = fs::read_file(&path)?;
        let buffer = compress::inflate(&compressed).map_err(|_| Error::CorruptObject(*hash))?;

        let nul = buffer
            .iter()
            .position(|&b| b == 0)
            .ok_or(Error::CorruptObject(*hash))?;
        let header = from_utf8(&buffer[..nul]).map_err(|_| Error::CorruptObject(*hash))?;
        let (type_name, size_str) = header.split_once(' ').ok_or(Error::CorruptObject(*hash))?;
        let obj_type = ObjectType::from_name(type_name).ok_or(Error::CorruptObject(*hash))?;
        let declared_size: usize = size_str.parse().map_err(|_| Error::CorruptObject(*hash))?;

        let body_start = nul + 1;
        if buffer.len() - body_start != declared_size {
            return Err(Error::CorruptObject(*hash));
        }

        Ok(ReadObject { buffer, body_start, obj_type })
    }

    pub fn read_as(&self, hash: &Hash, expected: ObjectType) -> Result<ReadObject> {
        let object = self.read(hash)?;
        if object.obj_type() != expected {
            log::warn!("object {} was expected to be a {} but is a {}", hash, expected, object.obj_type());
            return Err(Error::CorruptObject(*hash));
        }
        Ok(object)
    }

    /// Writes a fully-formed canonical representation. Idempotent: if the
    /// shard already holds this digest, this is a successful no-op.
    pub fn write_canonical(&self, canonical: &[u8]) -> Result<Hash> {
        let hash = Hash::of_canonical(canonical);
        let path = self.path_for(&hash);

        if path.is_file() {
            return Ok(hash);
        }

        let compressed = compress::deflate(canonical);
        fs::write_file(&path, &compressed)?;
        Ok(hash)
    }

    pub fn write(&self, obj_type: ObjectType, payload: &[u8]) -> Result<Hash> {
        let canonical = build_canonical(obj_type, payload);
        self.write_canonical(&canonical)
    }

    /// Reads a file from disk and stores it as a blob.
    pub fn write_blob_from_file(&self, path: &Path) -> Result<Hash> {
        let data = fs::read_file(path)?;
        self.write(ObjectType::Blob, &data)
    }

    /// Recursively builds a tree object from a directory's contents.
    ///
    /// Entries are sorted byte-wise ascending by filename so the resulting
    /// digest depends only on the directory's contents, never on the
    /// filesystem's reported iteration order.
    pub fn write_tree_from_dir(&self, dir: &Path) -> Result<Hash> {
        let mut entries = fs::list_dir(dir)?;
        entries.retain(|e| e.name != METADATA_DIR && e.name != "." && e.name != "..");
        entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));

        let mut body = Vec::new();
        for entry in entries {
            let full = dir.join(&entry.name);

            let (mode, hash) = if entry.is_file {
                (TREE_MODE_FILE, self.write_blob_from_file(&full)?)
            } else if entry.is_dir {
                (TREE_MODE_DIR, self.write_tree_from_dir(&full)?)
            } else {
                // symlinks, pipes, sockets, etc. are not produced by this core
                continue;
            };

            body.extend_from_slice(mode.as_bytes());
            body.push(b' ');
            body.extend_from_slice(entry.name.as_bytes());
            body.push(0);
            body.extend_from_slice(hash.as_bytes());
        }

        self.write(ObjectType::Tree, &body)
    }

    /// Creates a commit object; identity and timestamp are caller-supplied,
    /// never hardcoded.
    #[allow(clippy::too_many_arguments)]
    pub fn write_commit(
        &self,
        tree: &Hash,
        parent: Option<&Hash>,
        author: (&str, &str),
        committer: (&str, &str),
        timestamp_secs: u64,
        timezone: &str,
        message: &str,
    ) -> Result<Hash> {
        let mut body = String::new();
        body.push_str(&format!("tree {}\n", tree));
        if let Some(parent) = parent {
            body.push_str(&format!("parent {}\n", parent));
        }
        body.push_str(&format!("author {} <{}> {} {}\n", author.0, author.1, timestamp_secs, timezone));
        body.push_str(&format!("committer {} <{}> {} {}\n", committer.0, committer.1, timestamp_secs, timezone));
        body.push('\n');
        body.push_str(message);
        body.push('\n');

        self.write(ObjectType::Commit, body.as_bytes())
    }

    /// Materializes a tree into a destination directory, recursing into
    /// subtrees. Existing files are overwritten; existing directories reused.
    pub fn materialize(&self, tree: &Hash, dest: &Path) -> Result<()> {
        fs::create_dir_all(dest)?;

        let object = self.read_as(tree, ObjectType::Tree)?;
        let mut iter = TreeIter::new(object.body());

        while let Some(entry) = iter.next()? {
            let full = dest.join(entry.name);
            if entry.mode == TREE_MODE_DIR {
                self.materialize(&entry.hash, &full)?;
            } else {
                let blob = self.read(&entry.hash)?;
                fs::write_file(&full, blob.body())?;
            }
        }

        Ok(())
    }
}

pub const TREE_MODE_FILE: &str = "100644";
pub const TREE_MODE_DIR: &str = "40000";

pub struct TreeEntry<'a> {
    pub mode: &'a str,
    pub name: &'a str,
    pub hash: Hash,
}

/// Iterates the binary entries of a tree payload: `<mode> <name>\0<20-byte hash>`.
pub struct TreeIter<'a> {
    remaining: &'a [u8],
}

impl<'a> TreeIter<'a> {
    pub fn new(tree_body: &'a [u8]) -> Self {
        Self { remaining: tree_body }
    }

    pub fn next(&mut self) -> Result<Option<TreeEntry<'a>>> {
        if self.remaining.is_empty() {
            return Ok(None);
        }

        let corrupt = || Error::Format("malformed tree entry".into());

        let nul = self.remaining.iter().position(|&b| b == 0).ok_or_else(corrupt)?;
        let (description, rest) = self.remaining.split_at(nul);
        let description = from_utf8(description).map_err(|_| corrupt())?;
        let (mode, name) = description.split_once(' ').ok_or_else(corrupt)?;

        let hash_bytes = rest.get(1..21).ok_or_else(corrupt)?;
        let mut array = [0; 20];
        array.copy_from_slice(hash_bytes);

        self.remaining = rest.get(21..).ok_or_else(corrupt)?;

        Ok(Some(TreeEntry { mode, name, hash: Hash::new(array) }))
    }
}

/// Extracts the tree digest from a commit's payload (always the first line).
pub fn commit_tree_hash(commit_body: &[u8]) -> Result<Hash> {
    let text = from_utf8(commit_body).map_err(|_| Error::Format("commit is not valid utf-8".into()))?;
    let first_line = text.lines().next().ok_or_else(|| Error::Format("empty commit body".into()))?;
    let hex = first_line
        .strip_prefix("tree ")
        .ok_or_else(|| Error::Format("commit does not start with a tree line".into()))?;
    Hash::from_hex(hex).ok_or_else(|| Error::Format("malformed tree digest in commit".into()))
}

/// Extracts the first parent digest from a commit's payload, if any.
pub fn commit_parent_hash(commit_body: &[u8]) -> Result<Option<Hash>> {
    let text = from_utf8(commit_body).map_err(|_| Error::Format("commit is not valid utf-8".into()))?;
    for line in text.lines() {
        if line.is_empty() {
            break;
        }
        if let Some(hex) = line.strip_prefix("parent ") {
            return Hash::from_hex(hex).map(Some).ok_or_else(|| Error::Format("malformed parent digest in commit".into()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn blob_write_read_round_trip() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        let hash = store.write(ObjectType::Blob, b"hello world").unwrap();
        assert_eq!(hash.to_string(), "95d09f2b10159347eece71399a7e2e907ea3df4");

        let object = store.read(&hash).unwrap();
        assert_eq!(object.obj_type(), ObjectType::Blob);
        assert_eq!(object.body(), b"hello world");
    }

    #[test]
    fn write_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());

        let h1 = store.write(ObjectType::Blob, b"same content").unwrap();
        let h2 = store.write(ObjectType::Blob, b"same content").unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn empty_directory_tree_is_well_known_hash() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        fs::create_dir_all(&dir.path().join(METADATA_DIR)).unwrap();

        let hash = store.write_tree_from_dir(dir.path()).unwrap();
        assert_eq!(hash.to_string(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
    }

    #[test]
    fn tree_is_deterministic_regardless_of_insertion_order() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        fs::create_dir_all(&dir.path().join(METADATA_DIR)).unwrap();

        std::fs::write(dir.path().join("b"), b"2").unwrap();
        std::fs::write(dir.path().join("a"), b"1").unwrap();

        let hash = store.write_tree_from_dir(dir.path()).unwrap();

        let object = store.read_as(&hash, ObjectType::Tree).unwrap();
        let mut iter = TreeIter::new(object.body());
        let first = iter.next().unwrap().unwrap();
        let second = iter.next().unwrap().unwrap();
        assert_eq!(first.name, "a");
        assert_eq!(second.name, "b");
        assert!(iter.next().unwrap().is_none());
    }

    #[test]
    fn not_found_for_missing_digest() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let hash = Hash::from_hex("0000000000000000000000000000000000000a").unwrap();
        assert!(matches!(store.read(&hash), Err(Error::NotFound(_))));
    }

    #[test]
    fn commit_tree_hash_reads_first_line() {
        let body = b"tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\nauthor A <a@example.com> 0 +0000\ncommitter A <a@example.com> 0 +0000\n\nmsg\n";
        let hash = commit_tree_hash(body).unwrap();
        assert_eq!(hash.to_string(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
    }
}
