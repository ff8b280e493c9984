// src/deps/file.rs

//! Local file and directory-prefix kinds.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use blake3::Hasher;

use crate::deps::Witness;
use crate::errors::Result;

/// Change detection mode for file dependencies.
///
/// `ContentHash` is the default 3-level check: an unchanged mtime is
/// accepted as unmodified without reading the file; a changed size is
/// modified without hashing; otherwise the content digest decides.
/// `Timestamp` compares mtime only, like make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileChecker {
    #[default]
    ContentHash,
    Timestamp,
}

/// Dependency on a local file. Key is the absolute path.
#[derive(Debug, Clone)]
pub struct FileDep {
    path: PathBuf,
    checker: FileChecker,
}

impl FileDep {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: absolutize(path.as_ref()),
            checker: FileChecker::default(),
        }
    }

    pub fn with_checker(mut self, checker: FileChecker) -> Self {
        self.checker = checker;
        self
    }

    pub fn key(&self) -> String {
        self.path.display().to_string()
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(self.path.exists())
    }

    pub fn witness(&self) -> Result<Witness> {
        let md = fs::metadata(&self.path)?;
        match self.checker {
            FileChecker::Timestamp => Ok(Witness::Mtime(mtime_pair(&md))),
            FileChecker::ContentHash => Ok(Witness::FileStat {
                mtime: mtime_pair(&md),
                size: md.len(),
                digest: hash_file(&self.path)?,
            }),
        }
    }

    pub fn modified_since(&self, stored: &Witness) -> Result<bool> {
        let md = match fs::metadata(&self.path) {
            Ok(md) => md,
            // Missing file: caught by the existence check, report modified.
            Err(_) => return Ok(true),
        };

        match (self.checker, stored) {
            (FileChecker::Timestamp, Witness::Mtime(stored_mtime)) => {
                Ok(mtime_pair(&md) != *stored_mtime)
            }
            (
                FileChecker::ContentHash,
                Witness::FileStat {
                    mtime,
                    size,
                    digest,
                },
            ) => {
                // Level 1: unchanged timestamp means unchanged file.
                if mtime_pair(&md) == *mtime {
                    return Ok(false);
                }
                // Level 2: size change is definitive.
                if md.len() != *size {
                    return Ok(true);
                }
                // Level 3: compare content digests.
                Ok(hash_file(&self.path)? != *digest)
            }
            // Stored witness written by a different checker mode.
            _ => Ok(true),
        }
    }
}

/// Target produced at a local file path. Key is the absolute path.
#[derive(Debug, Clone)]
pub struct FileTarget {
    path: PathBuf,
}

impl FileTarget {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: absolutize(path.as_ref()),
        }
    }

    pub fn key(&self) -> String {
        self.path.display().to_string()
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(self.path.exists())
    }
}

/// Dependency on a directory prefix. Key is the absolute path with a
/// trailing `/`; its witness digests the recursive listing, so adding,
/// removing or touching any file under the prefix is a modification.
#[derive(Debug, Clone)]
pub struct DirDep {
    path: PathBuf,
}

impl DirDep {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: absolutize(path.as_ref()),
        }
    }

    pub fn key(&self) -> String {
        prefix_key(&self.path)
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(self.path.is_dir())
    }

    pub fn witness(&self) -> Result<Witness> {
        Ok(Witness::Digest(hash_listing(&self.path)?))
    }
}

/// Target producing files under a directory prefix. Key has a trailing `/`.
#[derive(Debug, Clone)]
pub struct DirTarget {
    path: PathBuf,
}

impl DirTarget {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: absolutize(path.as_ref()),
        }
    }

    pub fn key(&self) -> String {
        prefix_key(&self.path)
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(self.path.is_dir())
    }
}

fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn prefix_key(path: &Path) -> String {
    let mut key = path.display().to_string();
    if !key.ends_with('/') {
        key.push('/');
    }
    key
}

fn mtime_pair(md: &fs::Metadata) -> (i64, u32) {
    md.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| (d.as_secs() as i64, d.subsec_nanos()))
        .unwrap_or((0, 0))
}

/// Compute the blake3 digest of a single file.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = File::open(path)?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Deterministic digest over a directory's recursive listing.
///
/// Entries are hashed as (relative path, size, mtime seconds), sorted by
/// path so iteration order does not matter.
fn hash_listing(root: &Path) -> Result<String> {
    let mut entries: Vec<(String, u64, i64)> = Vec::new();
    collect_entries(root, root, &mut entries)?;
    entries.sort();

    let mut hasher = Hasher::new();
    for (rel, size, mtime) in entries {
        hasher.update(rel.as_bytes());
        hasher.update(&size.to_le_bytes());
        hasher.update(&mtime.to_le_bytes());
    }
    Ok(hasher.finalize().to_hex().to_string())
}

fn collect_entries(
    root: &Path,
    dir: &Path,
    out: &mut Vec<(String, u64, i64)>,
) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_entries(root, &path, out)?;
        } else {
            let md = entry.metadata()?;
            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .display()
                .to_string();
            out.push((rel, md.len(), mtime_pair(&md).0));
        }
    }
    Ok(())
}
