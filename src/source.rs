//! Entity stream sources.
//!
//! A source supports only forward sequential iteration, but a fresh
//! scan over the same backing dataset can be opened any number of
//! times; the resolver relies on that re-open behavior. Within one
//! scan, entities must arrive nodes first, then ways, then relations
//! (the bounding-box precondition); the JSONL source inherits whatever
//! order the file has, so files are expected to be sorted that way,
//! like OSM extracts are.

use crate::model::{Entity, KindMask};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// A re-openable, forward-only stream of entities.
pub trait EntitySource {
    /// Open a fresh sequential scan, restricted to the given kinds.
    fn scan(&self, mask: KindMask) -> Result<Box<dyn Iterator<Item = Result<Entity>> + '_>>;
}

/// In-memory source, mainly for tests and small programmatic runs.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entities: Vec<Entity>,
}

impl MemorySource {
    pub fn new(entities: Vec<Entity>) -> Self {
        MemorySource { entities }
    }
}

impl EntitySource for MemorySource {
    fn scan(&self, mask: KindMask) -> Result<Box<dyn Iterator<Item = Result<Entity>> + '_>> {
        Ok(Box::new(
            self.entities
                .iter()
                .filter(move |e| mask.contains(e.kind()))
                .cloned()
                .map(Ok),
        ))
    }
}

/// Newline-delimited JSON source; one entity per line, blank lines
/// ignored. Each scan re-opens the file from the start.
#[derive(Debug, Clone)]
pub struct JsonlSource {
    path: PathBuf,
}

impl JsonlSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        JsonlSource {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl EntitySource for JsonlSource {
    fn scan(&self, mask: KindMask) -> Result<Box<dyn Iterator<Item = Result<Entity>> + '_>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Source: failed to open {:?}", self.path))?;
        let path = self.path.clone();
        let iter = BufReader::new(file)
            .lines()
            .enumerate()
            .filter_map(move |(idx, line)| match line {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => match serde_json::from_str::<Entity>(&line) {
                    Ok(entity) if mask.contains(entity.kind()) => Some(Ok(entity)),
                    Ok(_) => None,
                    Err(err) => Some(Err(anyhow::anyhow!(
                        "Source: {:?} line {}: {}",
                        path,
                        idx + 1,
                        err
                    ))),
                },
                Err(err) => Some(Err(anyhow::Error::from(err).context(format!(
                    "Source: failed reading {:?} at line {}",
                    path,
                    idx + 1
                )))),
            });
        Ok(Box::new(iter))
    }
}
