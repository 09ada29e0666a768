use super::traits::{MemoryRecall, MemorySave};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{PoisonError, RwLock};

/// Process-local memory store backing the `memory_save` / `memory_recall`
/// capability pair. Entries live only for the process lifetime; durable
/// backends are injected by the embedding application instead.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<Vec<MemoryEntry>>,
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    content: String,
    saved_at: DateTime<Utc>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MemorySave for InMemoryStore {
    async fn save(&self, content: &str) -> anyhow::Result<String> {
        let content = content.trim();
        if content.is_empty() {
            anyhow::bail!("refusing to save an empty memory entry");
        }
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        entries.push(MemoryEntry {
            content: content.to_string(),
            saved_at: Utc::now(),
        });
        Ok(format!("Saved to memory ({} entries total)", entries.len()))
    }
}

impl MemoryRecall for InMemoryStore {
    fn recall(&self, query: &str) -> String {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let needle = query.trim().to_lowercase();

        let mut matches: Vec<&MemoryEntry> = entries
            .iter()
            .filter(|entry| needle.is_empty() || entry.content.to_lowercase().contains(&needle))
            .collect();
        matches.sort_by_key(|entry| std::cmp::Reverse(entry.saved_at));

        if matches.is_empty() {
            return format!("No stored memories match \"{query}\"");
        }
        matches
            .iter()
            .map(|entry| format!("- {}", entry.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_recall_round_trip() {
        let store = InMemoryStore::new();
        store.save("the user prefers metric units").await.unwrap();
        store.save("project deadline is Friday").await.unwrap();

        let recalled = store.recall("deadline");
        assert!(recalled.contains("project deadline is Friday"));
        assert!(!recalled.contains("metric units"));
    }

    #[tokio::test]
    async fn empty_save_rejected() {
        let store = InMemoryStore::new();
        assert!(store.save("   ").await.is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn no_match_reports_query() {
        let store = InMemoryStore::new();
        store.save("something").await.unwrap();
        let recalled = store.recall("unrelated");
        assert!(recalled.contains("No stored memories match"));
        assert!(recalled.contains("unrelated"));
    }

    #[tokio::test]
    async fn blank_query_returns_everything() {
        let store = InMemoryStore::new();
        store.save("alpha").await.unwrap();
        store.save("beta").await.unwrap();
        let recalled = store.recall("");
        assert!(recalled.contains("alpha"));
        assert!(recalled.contains("beta"));
    }

    #[tokio::test]
    async fn recall_is_case_insensitive() {
        let store = InMemoryStore::new();
        store.save("The Meeting is at NOON").await.unwrap();
        assert!(store.recall("meeting").contains("NOON"));
    }
}
