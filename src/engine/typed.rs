//! Typed access over the byte-oriented engine
//!
//! The engine stores opaque bytes; a [`ValueCodec`] chosen by the caller
//! decides how values are encoded. A cached payload that no longer decodes
//! (schema change, corrupted write) is counted as an error rather than a
//! hit, dropped from the local tier and reloaded through the loader.

use super::CacheEngine;
use crate::error::{CacheError, CacheResult, LoadError};
use crate::key::CacheKey;
use crate::policy::NamespacePolicy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::warn;

/// Encoding between values and cached bytes
pub trait ValueCodec<T>: Send + Sync {
    fn encode(&self, value: &T) -> CacheResult<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> CacheResult<T>;
}

/// JSON codec backed by `serde_json`
#[derive(Debug, Clone, Copy)]
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ValueCodec<T> for JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> CacheResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| CacheError::SerializationError(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> CacheResult<T> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::SerializationError(e.to_string()))
    }
}

impl CacheEngine {
    /// Typed read-through lookup
    ///
    /// A payload is only counted as a hit once it decodes. An undecodable
    /// payload is counted as an error, dropped from the local tier and never
    /// copied into it; if no tier yields a decodable value the lookup is a
    /// miss and the loader runs.
    pub async fn get_or_load_typed<T, C, F, Fut, E>(
        &self,
        namespace: &str,
        id: &str,
        codec: &C,
        loader: F,
    ) -> Result<Option<T>, LoadError<E>>
    where
        C: ValueCodec<T>,
        F: FnOnce(&str) -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        let policy = self.inner.policies.resolve(namespace)?.clone();
        let key = CacheKey::new(namespace, id);

        if let Some(value) = self.lookup_decoded(&key, &policy, codec).await? {
            return Ok(Some(value));
        }
        self.inner.stats.record_miss();

        let Some(value) = loader(id).await.map_err(LoadError::Loader)? else {
            return Ok(None);
        };
        let bytes = codec.encode(&value)?;
        self.write_through(key, Arc::from(bytes), &policy).await?;
        Ok(Some(value))
    }

    /// L1 then L2, accepting only payloads `codec` can decode
    async fn lookup_decoded<T, C>(
        &self,
        key: &CacheKey,
        policy: &NamespacePolicy,
        codec: &C,
    ) -> CacheResult<Option<T>>
    where
        C: ValueCodec<T>,
    {
        if let Some(bytes) = self.inner.local.get(key.as_str()) {
            match codec.decode(&bytes) {
                Ok(value) => {
                    self.inner.stats.record_l1_hit();
                    return Ok(Some(value));
                }
                Err(e) => {
                    self.inner.stats.record_error();
                    self.inner.local.remove(key.as_str());
                    warn!(key = %key, tier = "l1", error = %e, "Cached payload failed to decode");
                }
            }
        }

        let Some(bytes) = self.remote_get(key).await else {
            return Ok(None);
        };
        match codec.decode(&bytes) {
            Ok(value) => {
                self.inner.stats.record_l2_hit();
                self.inner
                    .populate_local(key.as_str(), Arc::from(bytes), policy.local_ttl)?;
                Ok(Some(value))
            }
            Err(e) => {
                self.inner.stats.record_error();
                warn!(key = %key, tier = "l2", error = %e, "Cached payload failed to decode");
                Ok(None)
            }
        }
    }

    /// Encode and store a typed value
    pub async fn put_typed<T, C>(
        &self,
        namespace: &str,
        id: &str,
        value: &T,
        codec: &C,
        group: Option<&str>,
    ) -> CacheResult<()>
    where
        C: ValueCodec<T>,
    {
        let bytes = codec.encode(value)?;
        self.put(namespace, id, bytes, group).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheEngineConfig, NamespacePolicyConfig};
    use crate::remote::RemoteCacheProvider;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Loan {
        id: u64,
        principal_cents: i64,
    }

    fn engine() -> CacheEngine {
        let config = CacheEngineConfig::for_test()
            .with_namespaces(vec![NamespacePolicyConfig::new("loan", 10, 60, 120)]);
        CacheEngine::new(config, RemoteCacheProvider::memory()).unwrap()
    }

    #[tokio::test]
    async fn test_typed_round_trip_through_cache() {
        let engine = engine();
        let codec = JsonCodec::<Loan>::new();
        let loan = Loan {
            id: 9,
            principal_cents: 1_250_000,
        };

        engine.put_typed("loan", "9", &loan, &codec, None).await.unwrap();
        let cached = engine
            .get_or_load_typed("loan", "9", &codec, |_| async {
                Err::<Option<Loan>, _>("loader must not run")
            })
            .await
            .unwrap();
        assert_eq!(cached, Some(loan));
    }

    #[tokio::test]
    async fn test_undecodable_payload_falls_back_to_loader() {
        let engine = engine();
        let codec = JsonCodec::<Loan>::new();
        engine.put("loan", "3", b"not json".to_vec(), None).await.unwrap();

        let loaded = engine
            .get_or_load_typed("loan", "3", &codec, |id| {
                let id: u64 = id.parse().unwrap();
                async move {
                    Ok::<_, String>(Some(Loan {
                        id,
                        principal_cents: 10,
                    }))
                }
            })
            .await
            .unwrap();

        assert_eq!(loaded.map(|l| l.id), Some(3));
        let stats = engine.statistics();
        // the bad payload sits in both tiers: two errors, no hit, one miss
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.l1_hits, 0);
        assert_eq!(stats.l2_hits, 0);
        assert_eq!(stats.misses, 1);

        // the reload replaced the bad payload
        let bytes = engine.get("loan", "3").await.unwrap().unwrap();
        assert!(codec.decode(&bytes).is_ok());
    }

    #[tokio::test]
    async fn test_undecodable_remote_payload_is_a_miss_and_not_copied_locally() {
        let engine = engine();
        let codec = JsonCodec::<Loan>::new();
        engine.put("loan", "4", b"{broken".to_vec(), None).await.unwrap();
        engine.clear_local();

        let loaded = engine
            .get_or_load_typed("loan", "4", &codec, |_| async {
                Ok::<_, String>(Some(Loan {
                    id: 4,
                    principal_cents: 99,
                }))
            })
            .await
            .unwrap();

        assert_eq!(loaded.map(|l| l.principal_cents), Some(99));
        let stats = engine.statistics();
        assert_eq!(stats.l2_hits, 0);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.hit_rate, 0.0);

        // the loaded value replaced the bad payload in both tiers
        let bytes = engine.get("loan", "4").await.unwrap().unwrap();
        assert_eq!(codec.decode(&bytes).unwrap().principal_cents, 99);
    }
}
