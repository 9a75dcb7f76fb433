//! 指数退避重试执行器 - 基础设施层
//!
//! 只重试被归类为瞬时故障的错误（见 [`crate::error::is_retryable`]），
//! 永久性错误（鉴权失败、格式错误）立即向上传播，不消耗重试次数。

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use tracing::{debug, warn};

use crate::error::is_retryable;

/// 重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大重试次数（不含首次尝试）
    pub max_retries: u32,
    /// 基础延迟
    pub base_delay: Duration,
    /// 延迟上限
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// 关键操作预设：重试多、上限长
    ///
    /// 用于事实抽取这类失败代价高的调用。
    pub fn critical() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
        }
    }

    /// 快速操作预设：重试少、上限短
    ///
    /// 用于语义裁决这类可以降级的便宜调用。
    pub fn fast() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(300),
            max_delay: Duration::from_secs(2),
        }
    }

    /// 计算第 attempt 次失败后的延迟
    ///
    /// `min(base * 2^attempt * (1 ± 25% 抖动), max)`。
    /// 抖动因子单独传入，方便测试验证边界。
    pub fn delay_for_attempt(&self, attempt: u32, jitter_factor: f64) -> Duration {
        let exp = 2_f64.powi(attempt.min(20) as i32);
        let base_ms = self.base_delay.as_millis() as f64;
        let delayed = base_ms * exp * jitter_factor;
        let capped = delayed.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }
}

/// 带重试地执行一个异步操作
///
/// # 参数
/// - `name`: 操作名称（用于日志）
/// - `policy`: 重试策略
/// - `operation`: 要执行的操作，每次重试都会重新调用
///
/// # 返回
/// 成功时返回 `(结果, 重试次数)`；全部尝试失败后返回最后一个错误。
pub async fn with_retry<T, F, Fut>(
    name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<(T, u32)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err: Option<anyhow::Error> = None;

    for attempt in 0..=policy.max_retries {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("✓ {} 在第 {} 次重试后成功", name, attempt);
                }
                return Ok((value, attempt));
            }
            Err(err) => {
                if !is_retryable(&err) {
                    debug!("{} 遇到不可重试错误, 立即上抛: {}", name, err);
                    return Err(err);
                }

                if attempt < policy.max_retries {
                    let jitter = rand::thread_rng().gen_range(0.75..=1.25);
                    let delay = policy.delay_for_attempt(attempt, jitter);
                    warn!(
                        "⚠️ {} 第 {}/{} 次尝试失败: {}, {}ms 后重试",
                        name,
                        attempt + 1,
                        policy.max_retries + 1,
                        err,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }

                last_err = Some(err);
            }
        }
    }

    // max_retries+1 次尝试全部失败，传播最后一个错误
    Err(last_err.expect("重试循环至少执行一次"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(8),
        }
    }

    #[test]
    fn test_delay_exponential_growth() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
        };
        // 抖动固定为 1.0 时延迟严格翻倍
        assert_eq!(policy.delay_for_attempt(0, 1.0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1, 1.0), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2, 1.0), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_never_exceeds_max() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        };
        for attempt in 0..20 {
            // 取抖动上界 1.25 仍不能超过 max_delay
            assert!(policy.delay_for_attempt(attempt, 1.25) <= Duration::from_secs(5));
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let (value, retries) = with_retry("test-op", &quick_policy(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    anyhow::bail!("connection reset by peer")
                }
                Ok(42)
            }
        })
        .await
        .expect("应该在第三次尝试成功");

        assert_eq!(value, 42);
        assert_eq!(retries, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_terminates_at_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(u32, u32)> = with_retry("always-fail", &quick_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { anyhow::bail!("rate limit exceeded") }
        })
        .await;

        assert!(result.is_err());
        // 最多 max_retries + 1 次尝试
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_non_retryable_propagates_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(u32, u32)> = with_retry("auth-fail", &quick_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { anyhow::bail!("invalid api key") }
        })
        .await;

        assert!(result.is_err());
        // 不可重试错误不消耗重试次数
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
