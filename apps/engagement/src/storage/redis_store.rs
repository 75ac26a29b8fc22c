use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::info;

use super::{KeyValueStore, StorageError};

/// Redis-backed store. Every key is written as `<namespace>:<key>` so several
/// deployments can share one Redis instance.
#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
    namespace: String,
}

impl RedisStore {
    pub async fn connect(url: &str, namespace: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        info!("Redis store connected (namespace: {namespace})");
        Ok(Self {
            connection,
            namespace: namespace.to_string(),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut con = self.connection.clone();
        let value: Option<String> = con.get(self.namespaced(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut con = self.connection.clone();
        con.set::<_, _, ()>(self.namespaced(key), value).await?;
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<(), StorageError> {
        if keys.is_empty() {
            return Ok(());
        }
        let namespaced: Vec<String> = keys.iter().map(|k| self.namespaced(k)).collect();
        let mut con = self.connection.clone();
        con.del::<_, ()>(namespaced).await?;
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        let mut con = self.connection.clone();
        let prefix = format!("{}:", self.namespace);
        let keys: Vec<String> = con.keys(format!("{prefix}*")).await?;
        Ok(strip_namespace(&prefix, keys))
    }
}

fn strip_namespace(prefix: &str, keys: Vec<String>) -> Vec<String> {
    let mut stripped: Vec<String> = keys
        .into_iter()
        .filter_map(|k| k.strip_prefix(prefix).map(str::to_string))
        .collect();
    stripped.sort();
    stripped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_namespace_drops_foreign_keys_and_sorts() {
        let keys = vec![
            "engagement:shared_skills".to_string(),
            "other:shared_skills".to_string(),
            "engagement:comments_abc".to_string(),
        ];
        assert_eq!(
            strip_namespace("engagement:", keys),
            vec!["comments_abc", "shared_skills"]
        );
    }
}
