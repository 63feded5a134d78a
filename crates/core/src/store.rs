use crate::models::{VectorMatch, VectorRecord};
use crate::traits::VectorIndex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Vector index access that never fails: when no index is configured every
/// operation is a no-op, and backend errors are logged and reported as
/// `false` or an empty result.
#[derive(Clone, Default)]
pub struct VectorStore {
    index: Option<Arc<dyn VectorIndex>>,
}

impl VectorStore {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index: Some(index) }
    }

    pub fn unavailable() -> Self {
        Self { index: None }
    }

    pub fn is_available(&self) -> bool {
        self.index.is_some()
    }

    pub async fn upsert(&self, records: &[VectorRecord]) -> bool {
        let Some(index) = &self.index else {
            return false;
        };
        match index.upsert(records).await {
            Ok(()) => {
                info!(vectors = records.len(), "stored vectors");
                true
            }
            Err(error) => {
                warn!(%error, "vector upsert failed");
                false
            }
        }
    }

    pub async fn query(&self, vector: &[f32], top_k: usize, chat_id: &str) -> Vec<VectorMatch> {
        let Some(index) = &self.index else {
            return Vec::new();
        };
        match index.query(vector, top_k, Some(chat_id)).await {
            Ok(matches) => matches,
            Err(error) => {
                warn!(%error, "vector query failed");
                Vec::new()
            }
        }
    }

    pub async fn delete_ids(&self, ids: &[String]) -> bool {
        let Some(index) = &self.index else {
            return false;
        };
        match index.delete_ids(ids).await {
            Ok(()) => true,
            Err(error) => {
                warn!(%error, "vector delete failed");
                false
            }
        }
    }

    /// Removes every vector tagged with `chat_id`, so a fresh upload does not
    /// compete with stale context.
    pub async fn clear_chat(&self, chat_id: &str) -> bool {
        let Some(index) = &self.index else {
            return false;
        };
        match index.delete_by_chat(chat_id).await {
            Ok(()) => {
                debug!(chat_id, "cleared old vectors");
                true
            }
            Err(error) => {
                warn!(chat_id, %error, "failed to clear old vectors");
                false
            }
        }
    }
}
