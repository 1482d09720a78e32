//! The `mailbox` module contains [MailboxTransport], a [Transport] backed by two directories.
//!
//! Every inbound message is a `*.json` file `{"subject": ..., "payload": ...}` in the inbox.
//! Acknowledged files are moved into `inbox/processed/`. Outbound messages are written to the
//! outbox as `{"to": ..., "subject": ..., "payload": {"payload": ...}}`.

use crate::transport::{InboundEnvelope, OutboundEnvelope, Transport};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};
use tokio::fs;
use uuid::Uuid;

/// Directory acknowledged inbox files are moved to.
const PROCESSED_DIR: &str = "processed";

#[derive(Debug, Deserialize)]
struct MailFile {
    #[serde(default)]
    subject: String,
    #[serde(default)]
    payload: Value,
}

/// A directory-backed [Transport].
#[derive(Debug, Clone)]
pub struct MailboxTransport {
    inbox: PathBuf,
    outbox: PathBuf,
}

impl MailboxTransport {
    /// Creates a new [MailboxTransport]. The directories are created on first use.
    pub fn new(inbox: impl Into<PathBuf>, outbox: impl Into<PathBuf>) -> Self {
        Self {
            inbox: inbox.into(),
            outbox: outbox.into(),
        }
    }

    pub fn inbox(&self) -> &Path {
        &self.inbox
    }

    pub fn outbox(&self) -> &Path {
        &self.outbox
    }

    /// Lists the inbox messages ordered by modification time, then by name.
    async fn pending(&self) -> Result<Vec<(SystemTime, String)>> {
        let mut pending = Vec::new();
        let mut entries = fs::read_dir(&self.inbox)
            .await
            .with_context(|| format!("reading inbox {}", self.inbox.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            pending.push((modified, entry.file_name().to_string_lossy().into_owned()));
        }

        pending.sort();
        Ok(pending)
    }
}

#[async_trait]
impl Transport for MailboxTransport {
    async fn fetch(&mut self, max: usize) -> Result<Vec<InboundEnvelope>> {
        fs::create_dir_all(&self.inbox).await?;

        let mut envelopes = Vec::new();
        for (_, name) in self.pending().await?.into_iter().take(max) {
            let raw = fs::read(self.inbox.join(&name)).await?;
            let envelope = match serde_json::from_slice::<MailFile>(&raw) {
                Ok(file) => InboundEnvelope {
                    id: name,
                    subject: file.subject,
                    body: file.payload,
                },
                Err(e) => {
                    // Unreadable files surface with an empty subject and get skipped.
                    tracing::warn!(target: "q21-scan-driver", "Unreadable inbox file {}: {}", name, e);
                    InboundEnvelope {
                        id: name,
                        subject: String::new(),
                        body: Value::Null,
                    }
                }
            };
            envelopes.push(envelope);
        }
        Ok(envelopes)
    }

    async fn acknowledge(&mut self, id: &str) -> Result<()> {
        let processed = self.inbox.join(PROCESSED_DIR);
        fs::create_dir_all(&processed).await?;
        fs::rename(self.inbox.join(id), processed.join(id))
            .await
            .with_context(|| format!("acknowledging {id}"))
    }

    async fn send(&mut self, envelope: OutboundEnvelope) -> Result<()> {
        fs::create_dir_all(&self.outbox).await?;

        let name = format!(
            "{}-{}.json",
            Utc::now().format("%Y%m%dT%H%M%S%.3f"),
            Uuid::new_v4()
        );
        let file = json!({
            "to": envelope.recipient,
            "subject": envelope.subject,
            "payload": {"payload": envelope.payload},
        });
        fs::write(self.outbox.join(&name), serde_json::to_vec_pretty(&file)?)
            .await
            .with_context(|| format!("writing {name} to the outbox"))
    }
}
