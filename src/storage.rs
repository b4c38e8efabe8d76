use std::path::PathBuf;

use anyhow::Context;
use axum::async_trait;
use bytes::Bytes;

use crate::config::StaticConfig;

#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes) -> anyhow::Result<()>;
    fn public_url(&self, key: &str) -> String;
}

/// Writes objects into a directory that is also served under the static
/// URL prefix.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str, url_prefix: &str) -> Self {
        Self {
            root: root.into(),
            base_url: format!(
                "{}/{}",
                public_base_url.trim_end_matches('/'),
                url_prefix.trim_matches('/')
            ),
        }
    }

    pub fn from_config(cfg: &StaticConfig) -> Self {
        Self::new(&cfg.dir, &cfg.public_base_url, &cfg.url_prefix)
    }
}

#[async_trait]
impl StorageClient for LocalStorage {
    async fn put_object(&self, key: &str, body: Bytes) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("create dir {}", self.root.display()))?;
        let path = self.root.join(key);
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        tracing::debug!(path = %path.display(), bytes = body.len(), "object stored");
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}
