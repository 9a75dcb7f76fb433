//! LLM 服务 - 业务能力层
//!
//! 生成调用契约的唯一实现：`generate(prompt, model, temperature, max_tokens)
//! → {content, usage}`。文本和视觉走同一个契约，只是消息构造不同。
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）
//!
//! 本层不做重试、熔断、缓存，那些由 `generation_service` 组合。

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrl,
    },
    Client,
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, LlmError};

/// 一次生成调用的 token 用量
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// 一次生成调用的结果
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub content: String,
    pub usage: GenerationUsage,
}

/// LLM 服务
///
/// 职责：
/// - 调用 LLM API 完成一次生成
/// - 提取内容与用量
/// - 不关心调用是否该被缓存/重试/熔断
pub struct LlmService {
    client: Client<OpenAIConfig>,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Self { client }
    }

    /// 发起一次文本生成
    ///
    /// # 参数
    /// - `prompt`: 用户提示词
    /// - `system_message`: 系统消息（可选）
    /// - `model`: 模型名称
    /// - `temperature`: 生成温度
    /// - `max_output_tokens`: 最大输出 token 数
    pub async fn generate(
        &self,
        prompt: &str,
        system_message: Option<&str>,
        model: &str,
        temperature: f32,
        max_output_tokens: u32,
    ) -> Result<GenerationOutput> {
        debug!("调用 LLM API，模型: {}", model);
        debug!("用户消息长度: {} 字符", prompt.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        self.send(messages, model, temperature, max_output_tokens)
            .await
    }

    /// 发起一次带图片的生成（Vision API）
    ///
    /// 图片以 URL 形式追加为用户消息的内容分片。
    pub async fn generate_with_images(
        &self,
        prompt: &str,
        system_message: Option<&str>,
        img_urls: &[String],
        model: &str,
        temperature: f32,
        max_output_tokens: u32,
    ) -> Result<GenerationOutput> {
        debug!("使用 Vision API，包含 {} 张图片", img_urls.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let mut content_parts: Vec<ChatCompletionRequestUserMessageContentPart> = Vec::new();
        content_parts.push(ChatCompletionRequestUserMessageContentPart::Text(
            ChatCompletionRequestMessageContentPartText {
                text: prompt.to_string(),
            },
        ));
        for url in img_urls.iter() {
            content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImage {
                    image_url: ImageUrl {
                        url: url.clone(),
                        detail: Some(ImageDetail::Auto),
                    },
                },
            ));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
            .build()?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        self.send(messages, model, temperature, max_output_tokens)
            .await
    }

    async fn send(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        model: &str,
        temperature: f32,
        max_output_tokens: u32,
    ) -> Result<GenerationOutput> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .temperature(temperature)
            .max_tokens(max_output_tokens)
            .build()?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            AppError::llm_api_failed(model, e)
        })?;

        let usage = response
            .usage
            .as_ref()
            .map(|u| GenerationUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                AppError::Llm(LlmError::EmptyContent {
                    model: model.to_string(),
                })
            })?;

        debug!("LLM API 调用成功, 输出 {} tokens", usage.output_tokens);

        Ok(GenerationOutput {
            content: content.trim().to_string(),
            usage,
        })
    }
}

/// OCR 客户端
///
/// 更窄的第二个契约：从图片里抽取原始文本，只返回文本。
/// 走内部 OCR 服务的 HTTP 接口，不经过聊天模型。
pub struct OcrClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    code: u64,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl OcrClient {
    /// 创建新的 OCR 客户端
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.ocr_api_base_url.clone(),
        }
    }

    /// 从图片 URL 抽取文本
    pub async fn extract_image_text(&self, image_url: &str) -> Result<String> {
        let endpoint = format!("{}/ocr/extract", self.base_url);
        debug!("调用 OCR 服务: {}", endpoint);

        let response = self
            .client
            .post(&endpoint)
            .json(&serde_json::json!({ "image_url": image_url }))
            .send()
            .await
            .map_err(|e| AppError::llm_api_failed("ocr", e))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(AppError::Llm(LlmError::BadStatus {
                status,
                message: None,
            })
            .into());
        }

        let body: OcrResponse = response
            .json()
            .await
            .map_err(|e| AppError::llm_api_failed("ocr", e))?;

        if body.code != 200 {
            return Err(AppError::Llm(LlmError::BadStatus {
                status: 200,
                message: body.message,
            })
            .into());
        }

        Ok(body.text.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            llm_api_key: "test-key".to_string(),
            ..Config::default()
        }
    }

    /// 测试文本生成连通性
    ///
    /// 运行方式：
    /// ```bash
    /// cargo test test_generate_simple -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_generate_simple() {
        let _ = tracing_subscriber::fmt::try_init();

        let config = Config::from_env();
        let service = LlmService::new(&config);

        let result = service
            .generate(
                "用一句话介绍什么是自由现金流。",
                Some("你是一个简洁的助手，回答要简短。"),
                &config.text_model_name,
                config.temperature,
                256,
            )
            .await;

        match result {
            Ok(output) => {
                println!("\n========== LLM 响应 ==========");
                println!("{}", output.content);
                println!("用量: {:?}", output.usage);
                println!("==============================\n");
                assert!(!output.content.is_empty());
            }
            Err(e) => panic!("LLM 调用失败: {}", e),
        }
    }

    /// 测试 Vision API 连通性
    #[tokio::test]
    #[ignore]
    async fn test_generate_with_images() {
        let _ = tracing_subscriber::fmt::try_init();

        let config = Config::from_env();
        let service = LlmService::new(&config);

        let image_urls = vec![
            "https://upload.wikimedia.org/wikipedia/commons/thumb/3/3a/Cat03.jpg/1200px-Cat03.jpg"
                .to_string(),
        ];

        let result = service
            .generate_with_images(
                "请描述这张图片中的内容。",
                None,
                &image_urls,
                &config.vision_model_name,
                config.temperature,
                512,
            )
            .await;

        match result {
            Ok(output) => {
                println!("{}", output.content);
                assert!(!output.content.is_empty());
            }
            Err(e) => panic!("Vision API 调用失败: {}", e),
        }
    }

    #[test]
    fn test_ocr_client_construction() {
        let config = test_config();
        let client = OcrClient::new(&config);
        assert!(client.base_url.starts_with("http"));
    }
}
