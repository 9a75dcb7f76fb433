//! 基础设施层（Infrastructure Layer）
//!
//! 故障隔离原语：熔断器、指数退避重试、响应缓存。
//! 它们持有保护下游依赖的共享状态（失败计数器、缓存条目），
//! 以注册表形式在进程启动时构造一次，按引用传给上层。

pub mod circuit_breaker;
pub mod response_cache;
pub mod retry;

pub use circuit_breaker::{BreakerRegistry, CircuitBreaker, CircuitState};
pub use response_cache::{make_cache_key, CacheRegistry, CacheStats, ResponseCache};
pub use retry::{with_retry, RetryPolicy};
