use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::cache::QueryCache;
use crate::query_client::{BlogQueryClient, ClientError};
use crate::registry::Registry;
use crate::subscriptions::{Subscription, SubscriptionSet};
use crate::types::{
    structure_of, BlogPacketData, FieldDescriptor, MergePages, NoData, NoFilter, PageRequest,
    Params, ParamsResponse, Post, PostAllResponse, PostId, PostResponse, QueryKey, QueryOptions,
    SentPost, SentPostAllResponse, SentPostResponse,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("QueryClient:{action} API Node Unavailable. Could not perform query: {source}")]
    NodeUnavailable {
        action: &'static str,
        #[source]
        source: ClientError,
    },
    #[error("Subscriptions: {0}")]
    Subscription(#[from] serde_json::Error),
}

impl StoreError {
    fn node_unavailable(action: &'static str, source: ClientError) -> Self {
        StoreError::NodeUnavailable { action, source }
    }
}

/// Outcome of one subscription-replay cycle. Failures carry the raw
/// descriptor alongside the error; one failure never halts the others.
#[derive(Debug, Default)]
pub struct ReplayReport {
    pub applied: usize,
    pub failures: Vec<(String, StoreError)>,
}

/// Query cache store for the blog module. Owns all cache and subscription
/// state; every mutation goes through its methods.
pub struct BlogStore {
    client: Arc<dyn BlogQueryClient>,
    cache: QueryCache,
    subscriptions: SubscriptionSet,
    structure: HashMap<&'static str, Vec<FieldDescriptor>>,
    registry: Registry,
    replay_limit: Semaphore,
}

fn structure_table() -> HashMap<&'static str, Vec<FieldDescriptor>> {
    HashMap::from([
        ("BlogPacketData", structure_of::<BlogPacketData>()),
        ("NoData", structure_of::<NoData>()),
        ("Params", structure_of::<Params>()),
        ("Post", structure_of::<Post>()),
        ("SentPost", structure_of::<SentPost>()),
    ])
}

impl BlogStore {
    pub fn new(client: Arc<dyn BlogQueryClient>, replay_concurrency: usize) -> Self {
        Self {
            client,
            cache: QueryCache::new(),
            subscriptions: SubscriptionSet::new(),
            structure: structure_table(),
            registry: Registry::new(),
            replay_limit: Semaphore::new(replay_concurrency),
        }
    }

    /// Clears every cache map and the subscription set. The structure table
    /// is a pure function of the entity types, so it stays as derived.
    pub fn reset_state(&self) {
        self.cache.clear_all();
        self.subscriptions.clear();
        info!("store state reset");
    }

    pub fn get_params(&self, query: Option<&PageRequest>) -> ParamsResponse {
        self.cache
            .params
            .get(&QueryKey::new(&NoFilter {}, query))
            .unwrap_or_default()
    }

    pub fn get_post(&self, params: &PostId, query: Option<&PageRequest>) -> PostResponse {
        self.cache
            .post
            .get(&QueryKey::new(params, query))
            .unwrap_or_default()
    }

    pub fn get_post_all(&self, query: Option<&PageRequest>) -> PostAllResponse {
        self.cache
            .post_all
            .get(&QueryKey::new(&NoFilter {}, query))
            .unwrap_or_default()
    }

    pub fn get_sent_post(&self, params: &PostId, query: Option<&PageRequest>) -> SentPostResponse {
        self.cache
            .sent_post
            .get(&QueryKey::new(params, query))
            .unwrap_or_default()
    }

    pub fn get_sent_post_all(&self, query: Option<&PageRequest>) -> SentPostAllResponse {
        self.cache
            .sent_post_all
            .get(&QueryKey::new(&NoFilter {}, query))
            .unwrap_or_default()
    }

    pub fn get_type_structure(&self, name: &str) -> Option<&[FieldDescriptor]> {
        self.structure.get(name).map(Vec::as_slice)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub async fn query_params(
        &self,
        options: QueryOptions,
        query: Option<PageRequest>,
    ) -> Result<ParamsResponse, StoreError> {
        let value = self
            .client
            .query_params()
            .await
            .map_err(|e| StoreError::node_unavailable("QueryParams", e))?;

        let key = QueryKey::new(&NoFilter {}, query.as_ref());
        debug!(%key, "caching Params");
        self.cache.params.put(key, value);

        if options.subscribe {
            self.subscriptions.add(&Subscription::QueryParams {
                all: options.all,
                query: query.clone(),
            });
        }
        Ok(self.get_params(query.as_ref()))
    }

    pub async fn query_post(
        &self,
        options: QueryOptions,
        params: PostId,
        query: Option<PageRequest>,
    ) -> Result<PostResponse, StoreError> {
        let value = self
            .client
            .query_post(params.id)
            .await
            .map_err(|e| StoreError::node_unavailable("QueryPost", e))?;

        let key = QueryKey::new(&params, query.as_ref());
        debug!(%key, "caching Post");
        self.cache.post.put(key, value);

        if options.subscribe {
            self.subscriptions.add(&Subscription::QueryPost {
                all: options.all,
                params,
                query: query.clone(),
            });
        }
        Ok(self.get_post(&params, query.as_ref()))
    }

    pub async fn query_post_all(
        &self,
        options: QueryOptions,
        query: Option<PageRequest>,
    ) -> Result<PostAllResponse, StoreError> {
        let value = self
            .fetch_all_posts(options.all, query.as_ref())
            .await
            .map_err(|e| StoreError::node_unavailable("QueryPostAll", e))?;

        let key = QueryKey::new(&NoFilter {}, query.as_ref());
        debug!(%key, posts = value.post.len(), "caching PostAll");
        self.cache.post_all.put(key, value);

        if options.subscribe {
            self.subscriptions.add(&Subscription::QueryPostAll {
                all: options.all,
                query: query.clone(),
            });
        }
        Ok(self.get_post_all(query.as_ref()))
    }

    pub async fn query_sent_post(
        &self,
        options: QueryOptions,
        params: PostId,
        query: Option<PageRequest>,
    ) -> Result<SentPostResponse, StoreError> {
        let value = self
            .client
            .query_sent_post(params.id)
            .await
            .map_err(|e| StoreError::node_unavailable("QuerySentPost", e))?;

        let key = QueryKey::new(&params, query.as_ref());
        debug!(%key, "caching SentPost");
        self.cache.sent_post.put(key, value);

        if options.subscribe {
            self.subscriptions.add(&Subscription::QuerySentPost {
                all: options.all,
                params,
                query: query.clone(),
            });
        }
        Ok(self.get_sent_post(&params, query.as_ref()))
    }

    pub async fn query_sent_post_all(
        &self,
        options: QueryOptions,
        query: Option<PageRequest>,
    ) -> Result<SentPostAllResponse, StoreError> {
        let value = self
            .fetch_all_sent_posts(options.all, query.as_ref())
            .await
            .map_err(|e| StoreError::node_unavailable("QuerySentPostAll", e))?;

        let key = QueryKey::new(&NoFilter {}, query.as_ref());
        debug!(%key, "caching SentPostAll");
        self.cache.sent_post_all.put(key, value);

        if options.subscribe {
            self.subscriptions.add(&Subscription::QuerySentPostAll {
                all: options.all,
                query: query.clone(),
            });
        }
        Ok(self.get_sent_post_all(query.as_ref()))
    }

    /// Fetches one page, then follows `pagination.next_key` until exhausted
    /// when `all` is set. Nothing is cached until every page succeeds.
    async fn fetch_all_posts(
        &self,
        all: bool,
        query: Option<&PageRequest>,
    ) -> Result<PostAllResponse, ClientError> {
        let mut value = self.client.query_post_all(query).await?;
        while all {
            let next_key = match value.pagination.as_ref().and_then(|p| p.next_key.clone()) {
                Some(key) if !key.is_empty() => key,
                _ => break,
            };
            let mut page = query.cloned().unwrap_or_default();
            page.key = Some(next_key);
            let next = self.client.query_post_all(Some(&page)).await?;
            value.merge_page(next);
        }
        Ok(value)
    }

    async fn fetch_all_sent_posts(
        &self,
        all: bool,
        query: Option<&PageRequest>,
    ) -> Result<SentPostAllResponse, ClientError> {
        let mut value = self.client.query_sent_post_all(query).await?;
        while all {
            let next_key = match value.pagination.as_ref().and_then(|p| p.next_key.clone()) {
                Some(key) if !key.is_empty() => key,
                _ => break,
            };
            let mut page = query.cloned().unwrap_or_default();
            page.key = Some(next_key);
            let next = self.client.query_sent_post_all(Some(&page)).await?;
            value.merge_page(next);
        }
        Ok(value)
    }

    pub fn unsubscribe(&self, subscription: &Subscription) {
        self.subscriptions.remove(subscription);
    }

    /// Replays every registered subscription concurrently, bounded by the
    /// replay semaphore, and aggregates the outcomes.
    pub async fn store_update(&self) -> ReplayReport {
        let snapshot = self.subscriptions.snapshot();
        let tasks = snapshot.into_iter().map(|raw| async move {
            let _permit = self.replay_limit.acquire().await;
            let outcome = self.replay(&raw).await;
            (raw, outcome)
        });

        let mut report = ReplayReport::default();
        for (raw, outcome) in futures::future::join_all(tasks).await {
            match outcome {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    warn!(subscription = raw.as_str(), error = %e, "subscription replay failed");
                    report.failures.push((raw, e));
                }
            }
        }
        report
    }

    async fn replay(&self, raw: &str) -> Result<(), StoreError> {
        let options = |all| QueryOptions {
            subscribe: false,
            all,
        };
        match Subscription::parse(raw)? {
            Subscription::QueryParams { all, query } => {
                self.query_params(options(all), query).await?;
            }
            Subscription::QueryPost { all, params, query } => {
                self.query_post(options(all), params, query).await?;
            }
            Subscription::QueryPostAll { all, query } => {
                self.query_post_all(options(all), query).await?;
            }
            Subscription::QuerySentPost { all, params, query } => {
                self.query_sent_post(options(all), params, query).await?;
            }
            Subscription::QuerySentPostAll { all, query } => {
                self.query_sent_post_all(options(all), query).await?;
            }
        }
        Ok(())
    }
}
