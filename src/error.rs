use thiserror::Error;

use crate::providers::ProviderError;

/// Failures that can occur while running a refresh cycle. Each variant is
/// contained at the smallest unit that can be skipped: a provider call, a
/// single record, or a persistence batch.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("record from {provider} carries no usable address")]
    IdentityUnresolved { provider: &'static str },

    #[error("persistence failed: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("cache unavailable: {0}")]
    CacheUnavailable(#[from] redis::RedisError),
}
