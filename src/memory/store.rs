//! Namespaced vector memory store
//! Sled-backed, one tree per (user, character) namespace, ranked by
//! embedding similarity. Fragments are append-only.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sled::Db;
use uuid::Uuid;

use crate::ai::EmbeddingProvider;

const TENANT: &str = "memories";

/// The scope that isolates one user's relationship with one character.
/// Every store operation requires one; there is no unscoped API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoryNamespace {
    pub user_id: String,
    pub character_id: String,
}

impl MemoryNamespace {
    pub fn new(user_id: impl Into<String>, character_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            character_id: character_id.into(),
        }
    }

    fn tree_name(&self) -> String {
        format!("{}/{}/{}", TENANT, self.user_id, self.character_id)
    }
}

/// A durable, embedded text record derived from one conversational turn.
/// Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryFragment {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub created_at: i64,
}

/// Main memory store backed by sled, shared across concurrent turns
pub struct MemoryStore {
    db: Arc<Db>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl MemoryStore {
    pub fn new(db: Arc<Db>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { db, embedder }
    }

    /// Search fragments in one namespace, ranked by similarity to the query.
    /// An empty namespace yields an empty sequence, never an error.
    pub async fn search(
        &self,
        namespace: &MemoryNamespace,
        query: &str,
    ) -> Result<Vec<MemoryFragment>> {
        let tree = self.db.open_tree(namespace.tree_name())?;
        if tree.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| anyhow::anyhow!("query embedding failed: {}", e))?;

        let mut scored: Vec<(f32, MemoryFragment)> = tree
            .iter()
            .values()
            .filter_map(|v| v.ok())
            .filter_map(|v| serde_json::from_slice::<MemoryFragment>(&v).ok())
            .map(|fragment| {
                let score = cosine_similarity(&query_embedding, &fragment.embedding);
                (score, fragment)
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().map(|(_, fragment)| fragment).collect())
    }

    /// Durably append one fragment to a namespace. At-least-once delivery is
    /// acceptable; duplicates are a tolerated side effect.
    pub async fn append(&self, namespace: &MemoryNamespace, content: &str) -> Result<MemoryFragment> {
        let embedding = self
            .embedder
            .embed(content)
            .await
            .map_err(|e| anyhow::anyhow!("fragment embedding failed: {}", e))?;

        let fragment = MemoryFragment {
            id: Uuid::new_v4().to_string(),
            content: content.to_string(),
            embedding,
            created_at: Utc::now().timestamp(),
        };

        let tree = self.db.open_tree(namespace.tree_name())?;
        let bytes = serde_json::to_vec(&fragment)?;
        tree.insert(fragment.id.as_bytes(), bytes)?;
        tree.flush()?;

        crate::observability::record_memory_write();
        Ok(fragment)
    }

    /// Number of fragments in a namespace
    pub fn count(&self, namespace: &MemoryNamespace) -> Result<usize> {
        let tree = self.db.open_tree(namespace.tree_name())?;
        Ok(tree.len())
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            embedder: Arc::clone(&self.embedder),
        }
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ProviderError;
    use async_trait::async_trait;
    use tempfile::tempdir;

    /// Deterministic embedder: a 4-dim vector derived from character counts
    struct StubEmbedder;

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        fn dims(&self) -> usize {
            4
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
            let mut v = [0.0f32; 4];
            for (i, c) in text.chars().enumerate() {
                v[i % 4] += (c as u32 % 97) as f32;
            }
            Ok(v.to_vec())
        }
    }

    /// Embedder that always fails, simulating a dead embedding service
    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        fn dims(&self) -> usize {
            4
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            Err(ProviderError::Api("embedding service down".to_string()))
        }
    }

    fn store(path: &std::path::Path, embedder: Arc<dyn EmbeddingProvider>) -> MemoryStore {
        let db = Arc::new(sled::open(path).unwrap());
        MemoryStore::new(db, embedder)
    }

    #[tokio::test]
    async fn test_append_and_search() {
        let dir = tempdir().unwrap();
        let store = store(&dir.path().join("test.db"), Arc::new(StubEmbedder));
        let ns = MemoryNamespace::new("u1", "c1");

        store.append(&ns, "散歩が好きだと言っていた").await.unwrap();
        store.append(&ns, "猫を飼っている").await.unwrap();

        let results = store.search(&ns, "散歩").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(store.count(&ns).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_namespace_isolation() {
        let dir = tempdir().unwrap();
        let store = store(&dir.path().join("test.db"), Arc::new(StubEmbedder));

        let ns_a = MemoryNamespace::new("u1", "c1");
        store.append(&ns_a, "u1とc1の思い出").await.unwrap();

        // Different character, different user: both must see nothing
        let other_character = MemoryNamespace::new("u1", "c2");
        let other_user = MemoryNamespace::new("u2", "c1");
        assert!(store.search(&other_character, "思い出").await.unwrap().is_empty());
        assert!(store.search(&other_user, "思い出").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_namespace_never_errors() {
        let dir = tempdir().unwrap();
        // Even a failing embedder cannot break an empty-namespace search
        let store = store(&dir.path().join("test.db"), Arc::new(FailingEmbedder));
        let ns = MemoryNamespace::new("u1", "c1");

        let results = store.search(&ns, "anything").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let dir = tempdir().unwrap();
        let store = store(&dir.path().join("test.db"), Arc::new(StubEmbedder));
        let ns = MemoryNamespace::new("u1", "c1");

        store.append(&ns, "abc").await.unwrap();
        store.append(&ns, "zzzzzzzz").await.unwrap();

        // Query identical to one fragment ranks it first
        let results = store.search(&ns, "abc").await.unwrap();
        assert_eq!(results[0].content, "abc");
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }
}
