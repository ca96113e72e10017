use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;

/// Job-scoped set of claimed keys.
///
/// `try_claim` returns `Ok(true)` when the key was free and is now taken,
/// `Ok(false)` when an earlier claim in the same job already holds it.
pub trait SentinelStore: Send + Sync {
    fn try_claim(&self, key: &str) -> anyhow::Result<bool>;
}

/// In-memory store for tests and single-process callers. Not durable.
#[derive(Default)]
pub struct InMemorySentinelStore {
    claimed: Mutex<HashSet<String>>,
}

impl InMemorySentinelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SentinelStore for InMemorySentinelStore {
    fn try_claim(&self, key: &str) -> anyhow::Result<bool> {
        let mut claimed = self
            .claimed
            .lock()
            .map_err(|_| anyhow::anyhow!("sentinel store lock poisoned"))?;
        Ok(claimed.insert(key.to_string()))
    }
}

/// Store backed by a job environment file of `NAME=VALUE` lines.
///
/// CI runners read such a file between steps and export its entries to later
/// processes, so a claim written here is seen by every later invocation in
/// the job, either through the file or through the inherited environment.
pub struct EnvFileSentinelStore {
    path: PathBuf,
    check_process_env: bool,
}

impl EnvFileSentinelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            check_process_env: true,
        }
    }

    /// Only consult the file, ignoring variables already in the environment.
    pub fn file_only(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            check_process_env: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_claimed(&self, key: &str) -> anyhow::Result<bool> {
        if self.check_process_env && std::env::var_os(key).is_some_and(|v| !v.is_empty()) {
            return Ok(true);
        }
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()))
            }
        };
        Ok(contents.lines().any(|line| {
            line.split_once('=').map(|(name, _)| name) == Some(key)
                || line.split_once("<<").map(|(name, _)| name) == Some(key)
        }))
    }
}

impl SentinelStore for EnvFileSentinelStore {
    fn try_claim(&self, key: &str) -> anyhow::Result<bool> {
        if self.is_claimed(key)? {
            return Ok(false);
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        writeln!(file, "{key}={key}").with_context(|| format!("writing {}", self.path.display()))?;
        Ok(true)
    }
}
