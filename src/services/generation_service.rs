//! 可靠生成服务 - 业务能力层
//!
//! 把裸的 LLM 调用组合成"缓存 → 熔断 → 重试 → 调用"的可靠链路。
//! 组合是显式的函数包裹，不是继承，三层各自可以单独测试。
//!
//! 每次生成调用输出一条结构化日志：请求 id、功能名、模型、token 用量、
//! 延迟、成败、重试次数、缓存命中、是否走了兜底。凭这条记录可以离线
//! 重建成本和可靠性指标，不需要重放调用。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::Instant;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::infrastructure::{make_cache_key, with_retry, BreakerRegistry, CacheRegistry, RetryPolicy};
use crate::services::llm_service::{GenerationOutput, GenerationUsage, LlmService, OcrClient};

/// 目标依赖（决定走哪个熔断器）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    /// 文本生成
    Text,
    /// 视觉调用
    Vision,
}

impl Dependency {
    fn as_str(self) -> &'static str {
        match self {
            Dependency::Text => "text-generation",
            Dependency::Vision => "vision",
        }
    }
}

/// 可靠生成服务
pub struct GenerationService {
    llm: LlmService,
    ocr: OcrClient,
    breakers: Arc<BreakerRegistry>,
    caches: Arc<CacheRegistry>,
    config: Config,
}

impl GenerationService {
    /// 创建新的可靠生成服务
    ///
    /// 注册表在进程启动时构造一次后注入，测试可以传隔离实例。
    pub fn new(config: &Config, breakers: Arc<BreakerRegistry>, caches: Arc<CacheRegistry>) -> Self {
        Self {
            llm: LlmService::new(config),
            ocr: OcrClient::new(config),
            breakers,
            caches,
            config: config.clone(),
        }
    }

    /// 原始 OCR 抽取（第二个更窄的契约, 只返回文本）
    ///
    /// 与视觉生成共用同一个熔断器：它们打到的是同一个下游依赖。
    pub async fn extract_image_text(&self, image_url: &str) -> Result<String> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        let policy = RetryPolicy::fast();

        let result = self
            .breakers
            .vision
            .call(|| async {
                with_retry("extract_image_text", &policy, || async {
                    self.ocr.extract_image_text(image_url).await
                })
                .await
            })
            .await;

        match result {
            Ok((text, retry_count)) => {
                self.log_call(
                    request_id,
                    "extract_image_text",
                    "ocr",
                    GenerationUsage::default(),
                    started.elapsed(),
                    true,
                    retry_count,
                    false,
                    false,
                );
                Ok(text)
            }
            Err(err) => {
                self.log_call(
                    request_id,
                    "extract_image_text",
                    "ocr",
                    GenerationUsage::default(),
                    started.elapsed(),
                    false,
                    policy.max_retries,
                    false,
                    false,
                );
                Err(err)
            }
        }
    }

    /// 文本生成（熔断 + 重试，不缓存）
    pub async fn generate_text(
        &self,
        function: &str,
        prompt: &str,
        system: Option<&str>,
        policy: &RetryPolicy,
    ) -> Result<GenerationOutput> {
        self.run(function, Dependency::Text, prompt, system, &[], policy, None)
            .await
    }

    /// 文本生成（熔断 + 重试 + 响应缓存）
    ///
    /// 缓存键由功能名、提示词、模型、温度共同决定；命中时不发起任何
    /// 底层调用，token 用量记为零。
    pub async fn generate_text_cached(
        &self,
        function: &str,
        prompt: &str,
        system: Option<&str>,
        policy: &RetryPolicy,
        ttl: Option<Duration>,
    ) -> Result<GenerationOutput> {
        self.run(function, Dependency::Text, prompt, system, &[], policy, Some(ttl))
            .await
    }

    /// 视觉生成（独立的、更严格的熔断器）
    pub async fn generate_vision(
        &self,
        function: &str,
        prompt: &str,
        system: Option<&str>,
        img_urls: &[String],
        policy: &RetryPolicy,
    ) -> Result<GenerationOutput> {
        self.run(function, Dependency::Vision, prompt, system, img_urls, policy, None)
            .await
    }

    async fn run(
        &self,
        function: &str,
        dependency: Dependency,
        prompt: &str,
        system: Option<&str>,
        img_urls: &[String],
        policy: &RetryPolicy,
        cache_ttl: Option<Option<Duration>>,
    ) -> Result<GenerationOutput> {
        let request_id = Uuid::new_v4();
        let model = match dependency {
            Dependency::Text => self.config.text_model_name.clone(),
            Dependency::Vision => self.config.vision_model_name.clone(),
        };
        let started = Instant::now();

        // 第一层：响应缓存（可选）
        let cache_key = cache_ttl.as_ref().map(|_| {
            make_cache_key(&serde_json::json!({
                "function": function,
                "prompt": prompt,
                "system": system,
                "model": model,
                "temperature": self.config.temperature,
            }))
        });

        if let Some(key) = &cache_key {
            if let Some(content) = self.caches.classification.get(key) {
                self.log_call(
                    request_id,
                    function,
                    &model,
                    GenerationUsage::default(),
                    started.elapsed(),
                    true,
                    0,
                    true,
                    false,
                );
                return Ok(GenerationOutput {
                    content,
                    usage: GenerationUsage::default(),
                });
            }
        }

        // 第二层：熔断器；第三层：重试
        let breaker = match dependency {
            Dependency::Text => &self.breakers.text,
            Dependency::Vision => &self.breakers.vision,
        };

        let result = breaker
            .call(|| async {
                with_retry(function, policy, || async {
                    if img_urls.is_empty() {
                        self.llm
                            .generate(
                                prompt,
                                system,
                                &model,
                                self.config.temperature,
                                self.config.max_output_tokens,
                            )
                            .await
                    } else {
                        self.llm
                            .generate_with_images(
                                prompt,
                                system,
                                img_urls,
                                &model,
                                self.config.temperature,
                                self.config.max_output_tokens,
                            )
                            .await
                    }
                })
                .await
            })
            .await;

        match result {
            Ok((output, retry_count)) => {
                if let (Some(key), Some(ttl)) = (&cache_key, cache_ttl) {
                    self.caches
                        .classification
                        .set(key.clone(), output.content.clone(), ttl);
                }
                self.log_call(
                    request_id,
                    function,
                    &model,
                    output.usage,
                    started.elapsed(),
                    true,
                    retry_count,
                    false,
                    false,
                );
                Ok(output)
            }
            Err(err) => {
                self.log_call(
                    request_id,
                    function,
                    &model,
                    GenerationUsage::default(),
                    started.elapsed(),
                    false,
                    policy.max_retries,
                    false,
                    false,
                );
                Err(err.context(format!("生成调用失败 (功能: {}, 依赖: {})", function, dependency.as_str())))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn log_call(
        &self,
        request_id: Uuid,
        function: &str,
        model: &str,
        usage: GenerationUsage,
        latency: Duration,
        success: bool,
        retry_count: u32,
        cache_hit: bool,
        fallback_used: bool,
    ) {
        info!(
            request_id = %request_id,
            function = function,
            model = model,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            latency_ms = latency.as_millis() as u64,
            success = success,
            retry_count = retry_count,
            cache_hit = cache_hit,
            fallback_used = fallback_used,
            "📡 生成调用记录"
        );
    }

    /// 缓存注册表（供统计输出）
    pub fn caches(&self) -> &CacheRegistry {
        &self.caches
    }

    /// 熔断器注册表（供状态查询）
    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }
}
