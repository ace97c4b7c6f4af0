use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub node_base_url: String,
    pub block_stream_url: String,
    pub replay_concurrency: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let node_base_url =
            std::env::var("BLOG_NODE_BASE_URL").unwrap_or_else(|_| "http://localhost:1317".into());
        let block_stream_url = std::env::var("BLOG_BLOCK_STREAM_URL")
            .unwrap_or_else(|_| "http://localhost:26657/blocks".into());
        let replay_concurrency = std::env::var("BLOG_REPLAY_CONCURRENCY")
            .unwrap_or_else(|_| "8".into())
            .parse()
            .context("BLOG_REPLAY_CONCURRENCY must be a number")?;

        Ok(Self {
            node_base_url,
            block_stream_url,
            replay_concurrency,
        })
    }
}
