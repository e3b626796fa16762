//! Plain-text documents and the JSON Lines link sink
//!
//! A document is a UTF-8 text file holding roughly one citation per line.
//! Wrapped lines are rejoined and lines holding several citations are split
//! before items are built. Items are indexed in document order and keep the
//! 0-based line number they start on.

use async_trait::async_trait;
use citelink_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::models::Item;
use crate::services::engine::LinkSink;
use crate::services::segmenter::{merge_fragmented_lines, split_concatenated_readings};

/// Suffix of the link file written next to a document
pub const LINKS_SUFFIX: &str = "links.jsonl";

/// Read a document's items
pub async fn read_items(path: &Path) -> Result<Vec<Item>> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            Error::NotFound(format!("Document not found: {}", path.display()))
        }
        _ => Error::Io(e),
    })?;

    Ok(items_from_text(&content))
}

/// Items from document text
pub fn items_from_text(content: &str) -> Vec<Item> {
    merge_fragmented_lines(content.lines().enumerate())
        .into_iter()
        .flat_map(|(line, text)| {
            split_concatenated_readings(&text)
                .into_iter()
                .map(move |segment| (line, segment))
        })
        .enumerate()
        .map(|(index, (line, text))| Item::at_line(index, line, text))
        .collect()
}

/// Stable identifier for a document's saved progress
///
/// The canonical path when the document exists, else the absolute path, so
/// progress of a moved or deleted document can still be addressed.
pub fn document_id(path: &Path) -> Result<String> {
    let resolved = match path.canonicalize() {
        Ok(canonical) => canonical,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && path.is_absolute() => {
            path.to_path_buf()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => std::env::current_dir()?.join(path),
        Err(e) => return Err(Error::Io(e)),
    };
    Ok(resolved.display().to_string())
}

/// `<document>.links.jsonl`
pub fn links_path(document: &Path) -> PathBuf {
    let mut name = document.as_os_str().to_owned();
    name.push(".");
    name.push(LINKS_SUFFIX);
    PathBuf::from(name)
}

/// One attached link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub index: usize,
    #[serde(default)]
    pub line: usize,
    pub text: String,
    pub url: String,
}

/// Appends link records to a JSON Lines file
pub struct JsonlLinkSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlLinkSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record written so far
    pub async fn read_records(&self) -> Result<Vec<LinkRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line)
                    .map_err(|e| Error::InvalidInput(format!("Malformed link record: {}", e)))
            })
            .collect()
    }
}

#[async_trait]
impl LinkSink for JsonlLinkSink {
    async fn attach_link(&self, item: &Item, url: &str) -> Result<()> {
        let record = LinkRecord {
            index: item.index,
            line: item.line,
            text: item.raw_text.clone(),
            url: url.to_string(),
        };
        let mut line = serde_json::to_string(&record)
            .map_err(|e| Error::Internal(format!("Failed to serialize link record: {}", e)))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        tracing::info!(index = item.index, url = %url, "Link attached");
        Ok(())
    }
}
