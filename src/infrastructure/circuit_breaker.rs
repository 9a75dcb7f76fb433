//! 熔断器 - 基础设施层
//!
//! 每个外部依赖一个熔断器实例，所有对同一依赖的调用共享同一个
//! 失败计数器。计数器更新需要互斥（运行时是多线程的），
//! 状态检查和更新都在锁内完成，锁不会跨 await 持有。

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppError;

/// 熔断器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// 关闭：所有调用正常通过
    Closed,
    /// 打开：调用被立即拒绝
    Open,
    /// 半开：允许有限次试探调用
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    half_open_attempts: u32,
    last_failure_time: Option<Instant>,
}

/// 熔断器
///
/// 状态机：closed --连续失败达到阈值--> open --冷却期满(惰性)--> half-open，
/// half-open 一次成功回到 closed，试探次数用尽回到 open。
pub struct CircuitBreaker {
    /// 被保护的下游依赖名称
    name: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    half_open_max_attempts: u32,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// 创建新的熔断器
    pub fn new(
        name: impl Into<String>,
        failure_threshold: u32,
        reset_timeout: Duration,
        half_open_max_attempts: u32,
    ) -> Self {
        Self {
            name: name.into(),
            failure_threshold,
            reset_timeout,
            half_open_max_attempts,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                half_open_attempts: 0,
                last_failure_time: None,
            }),
        }
    }

    /// 通过熔断器执行一个操作
    ///
    /// 打开状态下直接返回熔断错误；其余状态执行操作并根据结果
    /// 推进状态机。
    pub async fn call<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(remaining) = self.check_gate() {
            return Err(AppError::circuit_open(self.name.clone(), remaining).into());
        }

        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(err)
            }
        }
    }

    /// 通过熔断器执行操作，打开状态下改走兜底
    pub async fn call_with_fallback<T, F, Fut, FB, FutB>(
        &self,
        operation: F,
        fallback: FB,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
        FB: FnOnce() -> FutB,
        FutB: Future<Output = Result<T>>,
    {
        if let Some(remaining) = self.check_gate() {
            warn!(
                "🔌 熔断器 [{}] 打开中 (剩余冷却 {}ms), 改走兜底",
                self.name,
                remaining.as_millis()
            );
            return fallback().await;
        }

        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                warn!("🔌 熔断器 [{}] 记录失败后改走兜底: {}", self.name, err);
                fallback().await
            }
        }
    }

    /// 当前状态（会先执行惰性的 open→half-open 迁移）
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock().expect("熔断器锁中毒");
        self.maybe_half_open(&mut inner);
        inner.state
    }

    /// 手动复位（管理操作，如进程内调试命令）
    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("熔断器锁中毒");
        let old = inner.state;
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.half_open_attempts = 0;
        inner.last_failure_time = None;
        info!("🔌 熔断器 [{}] 状态迁移 {} → closed (原因: 手动复位)", self.name, old);
    }

    /// 检查是否放行；不放行时返回剩余冷却时间
    fn check_gate(&self) -> Option<Duration> {
        let mut inner = self.inner.lock().expect("熔断器锁中毒");
        self.maybe_half_open(&mut inner);

        if inner.state == CircuitState::Open {
            let remaining = inner
                .last_failure_time
                .map(|t| self.reset_timeout.saturating_sub(t.elapsed()))
                .unwrap_or(self.reset_timeout);
            return Some(remaining);
        }
        None
    }

    /// 冷却期满时惰性地从 open 迁移到 half-open
    fn maybe_half_open(&self, inner: &mut BreakerInner) {
        if inner.state == CircuitState::Open {
            let cooled = inner
                .last_failure_time
                .map(|t| t.elapsed() >= self.reset_timeout)
                .unwrap_or(true);
            if cooled {
                inner.state = CircuitState::HalfOpen;
                inner.half_open_attempts = 0;
                info!(
                    "🔌 熔断器 [{}] 状态迁移 open → half-open (原因: 冷却期满 {}ms)",
                    self.name,
                    self.reset_timeout.as_millis()
                );
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock().expect("熔断器锁中毒");
        if inner.state == CircuitState::HalfOpen {
            info!(
                "🔌 熔断器 [{}] 状态迁移 half-open → closed (原因: 试探调用成功)",
                self.name
            );
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.half_open_attempts = 0;
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock().expect("熔断器锁中毒");
        inner.last_failure_time = Some(Instant::now());

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    warn!(
                        "🔌 熔断器 [{}] 状态迁移 closed → open (原因: 连续失败 {} 次达到阈值)",
                        self.name, inner.failure_count
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.half_open_attempts += 1;
                if inner.half_open_attempts >= self.half_open_max_attempts {
                    inner.state = CircuitState::Open;
                    warn!(
                        "🔌 熔断器 [{}] 状态迁移 half-open → open (原因: {} 次试探全部失败)",
                        self.name, inner.half_open_attempts
                    );
                }
            }
            CircuitState::Open => {
                // 打开状态不放行调用，失败只可能来自并发窗口内的调用
            }
        }
    }
}

/// 熔断器注册表
///
/// 进程启动时构造一次，按引用传给调用方（依赖注入，不做隐藏全局量，
/// 测试可以构造隔离实例）。文本与视觉各一个熔断器：视觉调用更贵，
/// 阈值更低、冷却更长。
pub struct BreakerRegistry {
    /// 文本生成熔断器
    pub text: CircuitBreaker,
    /// 视觉调用熔断器
    pub vision: CircuitBreaker,
}

impl BreakerRegistry {
    /// 根据配置构造注册表
    pub fn new(config: &Config) -> Self {
        Self {
            text: CircuitBreaker::new(
                "text-generation",
                config.text_breaker_failure_threshold,
                Duration::from_millis(config.text_breaker_reset_timeout_ms),
                config.breaker_half_open_max_attempts,
            ),
            vision: CircuitBreaker::new(
                "vision",
                config.vision_breaker_failure_threshold,
                Duration::from_millis(config.vision_breaker_reset_timeout_ms),
                config.breaker_half_open_max_attempts,
            ),
        }
    }
}
