use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::error::{CrawlError, Result};

pub const REQUIRES: &str = "requires";
pub const PROPERTIES: &str = "properties";
pub const OBJECTS: &str = "objects";
pub const SIGNATURES: &str = "signatures";
pub const BUNDLE: &str = "api";

/// Artifacts in the order the bundle concatenates them.
pub const ARTIFACTS: [&str; 4] = [REQUIRES, OBJECTS, PROPERTIES, SIGNATURES];

/// Durable destination for a phase's finished record list.
pub trait Sink {
    /// Replace the artifact `name` with `records` as an ordered JSON array.
    fn write<R: Serialize>(&self, name: &str, records: &[R]) -> Result<()>;
}

/// Writes `<dir>/<prefix><name>.json`.
#[derive(Debug, Clone)]
pub struct JsonDirSink {
    dir: PathBuf,
    prefix: String,
}

impl JsonDirSink {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}{}.json", self.prefix, name))
    }

    /// Read an artifact back as raw JSON records.
    pub fn read(&self, name: &str) -> Result<Vec<Value>> {
        let path = self.path(name);
        let text = fs::read_to_string(&path).map_err(|e| CrawlError::Read {
            name: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| CrawlError::Read {
            name: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Record count per artifact; `None` when the artifact has not been written.
    pub fn stats(&self) -> Result<Vec<(&'static str, Option<usize>)>> {
        ARTIFACTS
            .iter()
            .map(|&name| {
                if self.path(name).exists() {
                    Ok((name, Some(self.read(name)?.len())))
                } else {
                    Ok((name, None))
                }
            })
            .collect()
    }

    /// Concatenate all four artifacts into `<prefix>api.json`.
    pub fn bundle(&self) -> Result<usize> {
        let mut all = Vec::new();
        for name in ARTIFACTS {
            all.extend(self.read(name)?);
        }
        self.write(BUNDLE, &all)?;
        Ok(all.len())
    }
}

impl Sink for JsonDirSink {
    fn write<R: Serialize>(&self, name: &str, records: &[R]) -> Result<()> {
        let path = self.path(name);
        let json = serde_json::to_string_pretty(records).map_err(|source| CrawlError::Serialize {
            name: name.to_string(),
            source,
        })?;

        fs::create_dir_all(&self.dir)
            .and_then(|_| fs::write(&path, json))
            .map_err(|source| CrawlError::Write {
                name: name.to_string(),
                source,
            })?;

        info!("Wrote {} records to {}", records.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;

    /// Keeps every write, in order.
    #[derive(Default)]
    pub struct MemorySink {
        pub writes: Mutex<Vec<(String, Value)>>,
        failing: HashSet<String>,
    }

    impl MemorySink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing(mut self, name: &str) -> Self {
            self.failing.insert(name.to_string());
            self
        }

        pub fn names(&self) -> Vec<String> {
            self.writes.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
        }

        pub fn get(&self, name: &str) -> Option<Value> {
            self.writes
                .lock()
                .unwrap()
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
        }
    }

    impl Sink for MemorySink {
        fn write<R: Serialize>(&self, name: &str, records: &[R]) -> Result<()> {
            if self.failing.contains(name) {
                return Err(CrawlError::Write {
                    name: name.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            let value = serde_json::to_value(records).map_err(|source| CrawlError::Serialize {
                name: name.to_string(),
                source,
            })?;
            self.writes.lock().unwrap().push((name.to_string(), value));
            Ok(())
        }
    }
}
