//! Background memory write-back
//! Extracts a durable fragment from a completed turn and appends it off the
//! response latency path. Failures are logged, retried a fixed number of
//! times, then dropped - they never reach the caller.

use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use super::store::{MemoryNamespace, MemoryStore};

const MAX_RETRIES: usize = 2;
const RETRY_DELAY: Duration = Duration::from_millis(500);

pub struct MemoryWriter {
    store: MemoryStore,
}

impl MemoryWriter {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    /// Spawn the write for one completed exchange. Fire-and-forget: the
    /// returned handle is for tests; callers on the response path ignore it.
    /// The task is independent of the request lifetime.
    pub fn spawn_write(
        &self,
        namespace: MemoryNamespace,
        user_message: String,
        assistant_message: String,
    ) -> JoinHandle<()> {
        let store = self.store.clone();
        tokio::spawn(async move {
            let content = summarize_exchange(&user_message, &assistant_message);
            write_with_retry(&store, &namespace, &content).await;
        })
    }
}

/// Serialize the exchange into one fragment. The assistant line is kept
/// verbatim so prompt phrases (like the choice prompt of the mini-game)
/// remain findable in later memory searches.
fn summarize_exchange(user_message: &str, assistant_message: &str) -> String {
    format!("ユーザー: {}\n私: {}", user_message, assistant_message)
}

async fn write_with_retry(store: &MemoryStore, namespace: &MemoryNamespace, content: &str) {
    for attempt in 0..=MAX_RETRIES {
        match store.append(namespace, content).await {
            Ok(fragment) => {
                tracing::debug!(
                    fragment_id = %fragment.id,
                    user_id = %namespace.user_id,
                    character_id = %namespace.character_id,
                    "memory fragment written"
                );
                return;
            }
            Err(e) if attempt < MAX_RETRIES => {
                tracing::warn!(
                    attempt,
                    "memory write failed, retrying: {}",
                    e
                );
                sleep(RETRY_DELAY).await;
            }
            Err(e) => {
                crate::observability::record_memory_write_failure();
                tracing::warn!("memory write dropped after {} retries: {}", MAX_RETRIES, e);
            }
        }
    }
}
