use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::query_client::BlogQueryClient;
use crate::store::BlogStore;

/// Monotonic block-height watermark; stale or duplicate heights from the
/// event stream are dropped instead of triggering redundant replays.
#[derive(Debug, Default)]
pub struct HeightGuard {
    last_seen: AtomicU64,
}

impl HeightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when `height` advances past everything already seen.
    pub fn advance(&self, height: u64) -> bool {
        loop {
            let last = self.last_seen.load(Ordering::SeqCst);
            if height <= last {
                return false;
            }
            match self
                .last_seen
                .compare_exchange(last, height, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return true,
                Err(_) => continue,
            }
        }
    }

    pub fn last(&self) -> u64 {
        self.last_seen.load(Ordering::SeqCst)
    }
}

/// Consumes the client's new-block stream and replays all registered
/// subscriptions once per fresh block. Stream errors are logged and the
/// loop keeps going; the loop ends when the stream does.
pub async fn run_block_loop(store: Arc<BlogStore>, client: Arc<dyn BlogQueryClient>) {
    let guard = HeightGuard::new();
    let mut stream = client.block_stream();

    while let Some(result) = stream.next().await {
        let event = match result {
            Ok(ev) => ev,
            Err(e) => {
                error!(error = %e, "block stream error");
                continue;
            }
        };

        if !guard.advance(event.height) {
            debug!(height = event.height, "dropping stale block event");
            continue;
        }

        let report = store.store_update().await;
        info!(
            height = event.height,
            applied = report.applied,
            failed = report.failures.len(),
            "replayed subscriptions"
        );
    }

    warn!("block stream ended");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    use super::*;
    use crate::query_client::{BlockStream, ClientError};
    use crate::types::{
        BlockEvent, PageRequest, ParamsResponse, PostAllResponse, PostResponse, QueryOptions,
        SentPostAllResponse, SentPostResponse,
    };

    #[test]
    fn height_guard_advances_monotonically() {
        let guard = HeightGuard::new();
        assert!(guard.advance(1));
        assert!(guard.advance(2));
        assert_eq!(guard.last(), 2);
    }

    #[test]
    fn height_guard_drops_old_and_duplicate() {
        let guard = HeightGuard::new();
        assert!(guard.advance(5));
        assert!(!guard.advance(5));
        assert!(!guard.advance(3));
        assert_eq!(guard.last(), 5);
    }

    #[test]
    fn height_guard_allows_gaps() {
        let guard = HeightGuard::new();
        assert!(guard.advance(1));
        assert!(guard.advance(10));
        assert_eq!(guard.last(), 10);
    }

    #[derive(Default)]
    struct BlockMock {
        heights: Vec<u64>,
        params_calls: AtomicUsize,
    }

    #[async_trait]
    impl BlogQueryClient for BlockMock {
        async fn query_params(&self) -> Result<ParamsResponse, ClientError> {
            self.params_calls.fetch_add(1, Ordering::SeqCst);
            Ok(ParamsResponse::default())
        }

        async fn query_post(&self, _id: u64) -> Result<PostResponse, ClientError> {
            Ok(PostResponse::default())
        }

        async fn query_post_all(
            &self,
            _page: Option<&PageRequest>,
        ) -> Result<PostAllResponse, ClientError> {
            Ok(PostAllResponse::default())
        }

        async fn query_sent_post(&self, _id: u64) -> Result<SentPostResponse, ClientError> {
            Ok(SentPostResponse::default())
        }

        async fn query_sent_post_all(
            &self,
            _page: Option<&PageRequest>,
        ) -> Result<SentPostAllResponse, ClientError> {
            Ok(SentPostAllResponse::default())
        }

        fn block_stream(&self) -> BlockStream {
            let events: Vec<Result<BlockEvent, ClientError>> = self
                .heights
                .iter()
                .map(|&height| Ok(BlockEvent { height }))
                .collect();
            Box::pin(futures::stream::iter(events))
        }
    }

    #[tokio::test]
    async fn block_loop_replays_once_per_fresh_height() {
        let client = Arc::new(BlockMock {
            heights: vec![1, 1, 2, 1],
            ..Default::default()
        });
        let store = Arc::new(BlogStore::new(client.clone(), 4));

        store
            .query_params(
                QueryOptions {
                    subscribe: true,
                    all: false,
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(client.params_calls.load(Ordering::SeqCst), 1);

        run_block_loop(store, client.clone()).await;

        // heights 1 and 2 are fresh, the duplicates are dropped
        assert_eq!(client.params_calls.load(Ordering::SeqCst), 3);
    }
}
