//! Client-side state management for the `planet.blog` module: a message
//! registry for transaction construction and a query cache store that
//! aggregates paginated results and replays subscribed queries on new
//! block events.

pub mod cache;
pub mod config;
pub mod query_client;
pub mod registry;
pub mod replay;
pub mod store;
pub mod subscriptions;
pub mod types;

pub use config::Config;
pub use query_client::{BlogQueryClient, ClientError, HttpQueryClient};
pub use registry::{MessageDescriptor, Registry};
pub use replay::run_block_loop;
pub use store::{BlogStore, ReplayReport, StoreError};
pub use subscriptions::Subscription;
pub use types::{PageRequest, PostId, QueryKey, QueryOptions};
