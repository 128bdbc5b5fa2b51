//! Bounded in-memory record of past generations.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::constants::HISTORY_CAPACITY;
use crate::generation::GenerationSettings;

/// One remembered generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Millisecond timestamp of the save, as a string
    pub id: String,
    /// The prompt that produced the image
    pub prompt: String,
    /// Where the image ended up
    pub image_url: String,
    /// Settings used for the generation, when the client sent them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<GenerationSettings>,
    /// How long the generation took, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// When the entry was recorded
    pub created_at: DateTime<Utc>,
}

/// Shared, bounded, newest-first list of history entries.
///
/// Process-lifetime only: history resets when the service restarts. The lock
/// makes concurrent appends well-behaved; the cap keeps the list at 50.
#[derive(Clone, Debug, Default)]
pub struct HistoryStore {
    entries: Arc<RwLock<VecDeque<HistoryEntry>>>,
}

impl HistoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts at the front and evicts the oldest entry past capacity.
    pub async fn append(&self, entry: HistoryEntry) {
        let mut entries = self.entries.write().await;
        entries.push_front(entry);
        entries.truncate(HISTORY_CAPACITY);
    }

    /// A newest-first snapshot of the current entries.
    pub async fn list(&self) -> Vec<HistoryEntry> {
        self.entries.read().await.iter().cloned().collect()
    }
}
