pub mod local;
pub mod provider;
pub mod rate_limit;
pub mod resilient;

pub use local::LocalEmbeddingProvider;
pub use provider::{EmbeddingError, EmbeddingProvider};
pub use rate_limit::{RateLimitConfig, RateLimitedProvider, SlidingWindowLimiter, wrap_rate_limited};
pub use resilient::{ResilientProvider, RetryConfig, is_retryable_error, wrap_resilient, wrap_resilient_arc};
