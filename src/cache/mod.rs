//! Two-tier compilation cache.
//!
//! The pipeline is memoized at two checkpoints. The input-keyed tier keys
//! on the raw source bytes (plus tool version, source path, the
//! cache-relevant option set, platform and requested output item) and
//! short-circuits parsing entirely. The model-keyed tier keys on the fully
//! flattened model, so a textually different but semantically identical
//! input still hits.
//!
//! Entries live one per file in the cache directory, named by the md5
//! digest of the canonically-serialized key. Writes go through a temporary
//! file followed by an atomic rename, so a concurrent reader never
//! observes a partially-written entry and writing the same key twice with
//! the same value is idempotent.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::ir::ast::Model;
use crate::ir::error::IrError;

/// Output items that must never be stored under a model-keyed entry:
/// their content depends on inputs (externally supplied binary images)
/// that the model does not capture.
pub const NEVER_MODEL_CACHE: &[&str] = &["capdl"];

/// Command line options that do not influence generated output. Each entry
/// is either already accounted for elsewhere in the cache key (platform,
/// item, the source file itself) or has no effect on code generation at
/// all (verbosity, cache control). This is an exclude list rather than an
/// include list, so a mistakenly missing entry causes a safe unnecessary
/// miss instead of an incorrect hit.
const CACHE_IRRELEVANT_OPTIONS: &[&str] = &[
    "cache",
    "cache_dir",
    "item",
    "model_file",
    "outfile",
    "platform",
    "verbose",
];

/// Whether `item` is eligible for model-keyed (tier-2) storage.
pub fn model_cacheable(item: &str) -> bool {
    !NEVER_MODEL_CACHE.contains(&item)
}

/// Reduce a command configuration to the option set that belongs in cache
/// keys: every option not on the exclude list, as sorted name/value pairs.
/// New options default to being included.
pub fn cache_relevant_options(options: &impl Serialize) -> Result<Vec<(String, String)>> {
    let value = serde_json::to_value(options)?;
    let map = value
        .as_object()
        .ok_or_else(|| anyhow!("options must serialize to an object"))?;
    let mut relevant: Vec<(String, String)> = map
        .iter()
        .filter(|(name, _)| !CACHE_IRRELEVANT_OPTIONS.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.to_string()))
        .collect();
    relevant.sort();
    Ok(relevant)
}

/// Cache operating mode, as selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    Off,
    On,
    ReadOnly,
    WriteOnly,
}

impl CacheMode {
    pub fn readable(self) -> bool {
        matches!(self, CacheMode::On | CacheMode::ReadOnly)
    }

    pub fn writable(self) -> bool {
        matches!(self, CacheMode::On | CacheMode::WriteOnly)
    }
}

impl FromStr for CacheMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(CacheMode::Off),
            "on" => Ok(CacheMode::On),
            "readonly" => Ok(CacheMode::ReadOnly),
            "writeonly" => Ok(CacheMode::WriteOnly),
            other => Err(format!(
                "invalid cache mode '{}' (expected off, on, readonly or writeonly)",
                other
            )),
        }
    }
}

/// A cache key. Serialization of the key is canonical: field order is
/// fixed, option maps arrive pre-sorted from `cache_relevant_options`, and
/// the model serializes its collections in deterministic order, so the
/// model variant acts as a structural (not textual) identity.
#[derive(Debug, Serialize)]
#[serde(tag = "tier")]
pub enum Key<'a> {
    Input {
        version: &'a str,
        source_path: &'a str,
        source: &'a str,
        options: &'a [(String, String)],
        platform: &'a str,
        item: &'a str,
    },
    Model {
        version: &'a str,
        model: &'a Model,
        options: &'a [(String, String)],
        platform: &'a str,
        item: &'a str,
    },
}

impl Key<'_> {
    pub fn item(&self) -> &str {
        match self {
            Key::Input { item, .. } | Key::Model { item, .. } => item,
        }
    }

    fn digest(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(format!("{:x}", md5::compute(bytes)))
    }

    fn check_integrity(&self) -> Result<()> {
        if let Key::Model { item, .. } = self {
            if !model_cacheable(item) {
                return Err(IrError::CacheIntegrityViolation {
                    item: (*item).to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// One input file contributing to a realized output, with the digest it
/// had at compile time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileHash {
    pub path: PathBuf,
    pub digest: String,
}

/// A realized output artifact together with the input files it was derived
/// from. The entry is only served while every recorded input still hashes
/// the same.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSet {
    pub output: String,
    pub files: Vec<FileHash>,
}

impl FileSet {
    pub fn new(output: String, paths: &[&Path]) -> Result<Self> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            files.push(FileHash {
                path: path.to_path_buf(),
                digest: hash_file(path)?,
            });
        }
        Ok(FileSet { output, files })
    }

    /// Whether every recorded input file still exists with its recorded
    /// digest.
    pub fn valid(&self) -> bool {
        self.files
            .iter()
            .all(|f| matches!(hash_file(&f.path), Ok(digest) if digest == f.digest))
    }
}

fn hash_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(format!("{:x}", md5::compute(bytes)))
}

/// A cached value: a realized file set for the input-keyed tier, raw
/// rendered text for the model-keyed tier. Never a partially-built model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CachedValue {
    Files(FileSet),
    Text(String),
}

/// On-disk compilation cache rooted at one directory.
pub struct Cache {
    dir: PathBuf,
}

impl Cache {
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Cache {
            dir: dir.to_path_buf(),
        })
    }

    /// Look up a key. A missing entry is a miss; an unreadable entry is
    /// treated as a miss rather than an error, since another invocation
    /// may rewrite it at any time.
    pub fn get(&self, key: &Key) -> Result<Option<CachedValue>> {
        key.check_integrity()?;
        let path = self.dir.join(key.digest()?);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                debug!("cache hit for {}", key.item());
                Ok(Some(value))
            }
            Err(e) => {
                warn!("discarding unreadable cache entry {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    /// Store a value under a key, atomically. Concurrent writers of the
    /// same key and value are idempotent.
    pub fn set(&self, key: &Key, value: &CachedValue) -> Result<()> {
        key.check_integrity()?;
        let path = self.dir.join(key.digest()?);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&serde_json::to_vec(value)?)?;
        tmp.persist(&path).map_err(|e| e.error)?;
        debug!("cached {} as {}", key.item(), path.display());
        Ok(())
    }
}
