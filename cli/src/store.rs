//! Ledger state file and event journal

use anyhow::{Context, Result};
use fs2::FileExt;
use guardrail_vault::{Ledger, LedgerSnapshot, VaultEvent};
use log::debug;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// JSON snapshot of the ledger plus a JSON-lines journal of emitted events
#[derive(Debug, Clone)]
pub struct Store {
    state_path: PathBuf,
    journal_path: PathBuf,
    lock_path: PathBuf,
}

/// Exclusive hold on the state file, released on drop
#[derive(Debug)]
pub struct StoreLock {
    file: std::fs::File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!("failed to release state lock: {}", e);
        }
    }
}

impl Store {
    /// The journal lives next to the state file: `ledger.json` -> `ledger.events.jsonl`
    pub fn new(state_path: PathBuf) -> Self {
        let journal_path = state_path.with_extension("events.jsonl");
        let lock_path = state_path.with_extension("lock");
        Self {
            state_path,
            journal_path,
            lock_path,
        }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn journal_path(&self) -> &Path {
        &self.journal_path
    }

    /// Take the exclusive advisory lock on `<state>.lock`, waiting for other writers
    ///
    /// Every load-apply-save cycle holds this lock, so concurrent invocations
    /// against the same state file are applied one at a time.
    pub async fn lock(&self) -> Result<StoreLock> {
        self.ensure_dir().await?;
        let path = self.lock_path.clone();
        tokio::task::spawn_blocking(move || -> Result<StoreLock> {
            let file = std::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)
                .with_context(|| format!("Failed to open lock file: {}", path.display()))?;
            FileExt::lock_exclusive(&file)
                .with_context(|| format!("Failed to lock state: {}", path.display()))?;
            debug!("locked {}", path.display());
            Ok(StoreLock { file })
        })
        .await
        .context("State lock task failed")?
    }

    async fn ensure_dir(&self) -> Result<()> {
        if let Some(dir) = self.state_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }
        Ok(())
    }

    /// Load the ledger; a missing state file is an empty ledger
    pub async fn load(&self) -> Result<Ledger> {
        if !fs::try_exists(&self.state_path).await.unwrap_or(false) {
            debug!("no state at {}, starting empty", self.state_path.display());
            return Ok(Ledger::new());
        }
        let data = fs::read_to_string(&self.state_path)
            .await
            .with_context(|| format!("Failed to read state file: {}", self.state_path.display()))?;
        let snapshot: LedgerSnapshot = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse state file: {}", self.state_path.display()))?;
        Ok(Ledger::restore(snapshot))
    }

    /// Write the ledger through a temp file so a crash never leaves half a state
    pub async fn save(&self, ledger: &Ledger) -> Result<()> {
        self.ensure_dir().await?;
        let json = serde_json::to_string_pretty(&ledger.snapshot()).context("Failed to serialize ledger")?;
        let tmp = self.state_path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
        fs::rename(&tmp, &self.state_path)
            .await
            .with_context(|| format!("Failed to replace state file: {}", self.state_path.display()))?;
        Ok(())
    }

    pub async fn append_events(&self, events: &[VaultEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let mut lines = String::new();
        for event in events {
            lines.push_str(&serde_json::to_string(event).context("Failed to serialize event")?);
            lines.push('\n');
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.journal_path)
            .await
            .with_context(|| format!("Failed to open journal: {}", self.journal_path.display()))?;
        file.write_all(lines.as_bytes())
            .await
            .with_context(|| format!("Failed to append to journal: {}", self.journal_path.display()))?;
        file.flush().await?;
        Ok(())
    }

    pub async fn read_events(&self) -> Result<Vec<VaultEvent>> {
        if !fs::try_exists(&self.journal_path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.journal_path)
            .await
            .with_context(|| format!("Failed to read journal: {}", self.journal_path.display()))?;
        data.lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(i, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("Bad journal entry at line {}", i + 1))
            })
            .collect()
    }
}
