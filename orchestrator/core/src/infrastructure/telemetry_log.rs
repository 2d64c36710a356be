// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! JSON-lines telemetry log on the local filesystem

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::telemetry::{TelemetryError, TelemetryLog, TelemetryRecord};

pub struct JsonlTelemetryLog {
    path: PathBuf,
    /// Serializes writers so lines never interleave
    write_lock: Mutex<()>,
}

impl JsonlTelemetryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TelemetryLog for JsonlTelemetryLog {
    async fn append(&self, record: &TelemetryRecord) -> Result<(), TelemetryError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<TelemetryRecord>, TelemetryError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut skipped = 0usize;
        // Lines are parsed as bytes so a write torn inside a UTF-8 sequence only loses that line
        let records = content
            .split(|byte| *byte == b'\n')
            .filter(|line| !line.trim_ascii().is_empty())
            .filter_map(|line| match serde_json::from_slice(line) {
                Ok(record) => Some(record),
                Err(_) => {
                    skipped += 1;
                    None
                }
            })
            .collect();

        if skipped > 0 {
            debug!(path = ?self.path, skipped, "Ignored unparseable telemetry lines");
        }
        Ok(records)
    }
}
