use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{canonical_json, PageRequest, PostId};

/// Saved action + payload descriptor, replayed on new-block events to keep
/// cached values fresh. The `subscribe` flag itself is never stored, so a
/// replay can't re-register the subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload")]
pub enum Subscription {
    QueryParams {
        all: bool,
        query: Option<PageRequest>,
    },
    QueryPost {
        all: bool,
        params: PostId,
        query: Option<PageRequest>,
    },
    QueryPostAll {
        all: bool,
        query: Option<PageRequest>,
    },
    QuerySentPost {
        all: bool,
        params: PostId,
        query: Option<PageRequest>,
    },
    QuerySentPostAll {
        all: bool,
        query: Option<PageRequest>,
    },
}

impl Subscription {
    pub fn action_name(&self) -> &'static str {
        match self {
            Subscription::QueryParams { .. } => "QueryParams",
            Subscription::QueryPost { .. } => "QueryPost",
            Subscription::QueryPostAll { .. } => "QueryPostAll",
            Subscription::QuerySentPost { .. } => "QuerySentPost",
            Subscription::QuerySentPostAll { .. } => "QuerySentPostAll",
        }
    }

    /// Canonical serialization used as the set key, so two descriptors that
    /// differ only in field order collapse to one entry.
    pub fn canonical(&self) -> String {
        serde_json::to_value(self)
            .map(|v| canonical_json(&v))
            .unwrap_or_default()
    }

    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[derive(Default)]
pub struct SubscriptionSet {
    entries: DashSet<String>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when an equal subscription was already registered.
    pub fn add(&self, subscription: &Subscription) -> bool {
        let inserted = self.entries.insert(subscription.canonical());
        if inserted {
            debug!(action = subscription.action_name(), "subscription added");
        }
        inserted
    }

    /// Removes by canonical serialization; no-op when absent.
    pub fn remove(&self, subscription: &Subscription) -> bool {
        let removed = self.entries.remove(&subscription.canonical()).is_some();
        if removed {
            debug!(action = subscription.action_name(), "subscription removed");
        }
        removed
    }

    pub fn contains(&self, subscription: &Subscription) -> bool {
        self.entries.contains(&subscription.canonical())
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_sub(id: u64) -> Subscription {
        Subscription::QueryPost {
            all: false,
            params: PostId { id },
            query: None,
        }
    }

    #[test]
    fn duplicate_subscriptions_collapse() {
        let set = SubscriptionSet::new();
        assert!(set.add(&post_sub(1)));
        assert!(!set.add(&post_sub(1)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn remove_absent_is_noop() {
        let set = SubscriptionSet::new();
        set.add(&post_sub(1));
        assert!(!set.remove(&post_sub(2)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn snapshot_round_trips() {
        let set = SubscriptionSet::new();
        let sub = Subscription::QueryPostAll {
            all: true,
            query: Some(PageRequest {
                limit: 100,
                ..Default::default()
            }),
        };
        set.add(&sub);

        let snapshot = set.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(Subscription::parse(&snapshot[0]).unwrap(), sub);
    }

    #[test]
    fn distinct_queries_are_distinct_entries() {
        let set = SubscriptionSet::new();
        set.add(&post_sub(1));
        set.add(&post_sub(2));
        assert_eq!(set.len(), 2);
        assert!(set.contains(&post_sub(1)));
    }
}
