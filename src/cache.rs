use dashmap::DashMap;

use crate::types::{
    ParamsResponse, PostAllResponse, PostResponse, QueryKey, SentPostAllResponse, SentPostResponse,
};

/// One cache map per query kind, keyed by canonical query key. Entries are
/// overwritten on every successful query and survive until a full reset.
pub struct EntityCache<T: Clone> {
    map: DashMap<QueryKey, T>,
}

impl<T: Clone> Default for EntityCache<T> {
    fn default() -> Self {
        Self {
            map: DashMap::new(),
        }
    }
}

impl<T: Clone> EntityCache<T> {
    pub fn get(&self, key: &QueryKey) -> Option<T> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    pub fn put(&self, key: QueryKey, value: T) {
        self.map.insert(key, value);
    }

    pub fn clear(&self) {
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[derive(Default)]
pub struct QueryCache {
    pub params: EntityCache<ParamsResponse>,
    pub post: EntityCache<PostResponse>,
    pub post_all: EntityCache<PostAllResponse>,
    pub sent_post: EntityCache<SentPostResponse>,
    pub sent_post_all: EntityCache<SentPostAllResponse>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_all(&self) {
        self.params.clear();
        self.post.clear();
        self.post_all.clear();
        self.sent_post.clear();
        self.sent_post_all.clear();
    }

    pub fn entry_count(&self) -> usize {
        self.params.len()
            + self.post.len()
            + self.post_all.len()
            + self.sent_post.len()
            + self.sent_post_all.len()
    }
}
