use serde::{Deserialize, Serialize};

use crate::error::{AppError, FileError};

/// 程序配置文件
///
/// 所有相似度阈值都是经验常数，保留原值以保证行为一致，
/// 但作为配置项暴露出来，方便后续重新标定。
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 每一波并发处理的章节数量
    pub max_concurrent_chapters: usize,
    /// 每章生成的题目数量
    pub questions_per_chapter: usize,
    /// 源文档存放目录
    pub source_folder: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    /// OCR 服务地址（原始文本抽取的窄契约）
    pub ocr_api_base_url: String,
    /// 文本生成模型
    pub text_model_name: String,
    /// 视觉模型（用于 OCR 和图片理解）
    pub vision_model_name: String,
    /// 生成温度
    pub temperature: f32,
    /// 单次调用最大输出 token 数
    pub max_output_tokens: u32,
    /// 拼入提示词前源文本的截断上限（字符数）
    pub source_truncate_chars: usize,
    // --- 熔断器配置 ---
    /// 文本生成熔断器：连续失败多少次后打开
    pub text_breaker_failure_threshold: u32,
    /// 文本生成熔断器：打开后冷却多少毫秒
    pub text_breaker_reset_timeout_ms: u64,
    /// 视觉调用熔断器：阈值更低（视觉调用更贵）
    pub vision_breaker_failure_threshold: u32,
    /// 视觉调用熔断器：冷却时间更长
    pub vision_breaker_reset_timeout_ms: u64,
    /// 半开状态允许的试探次数
    pub breaker_half_open_max_attempts: u32,
    // --- 响应缓存配置 ---
    /// 分类类缓存条目上限
    pub classification_cache_max_size: usize,
    /// 分类类缓存 TTL（秒），默认三天
    pub classification_cache_ttl_secs: u64,
    /// 事实类缓存条目上限
    pub fact_cache_max_size: usize,
    /// 事实类缓存 TTL（秒），默认一天
    pub fact_cache_ttl_secs: u64,
    // --- 相似度阈值 ---
    /// 跨章节去重阈值（比批次内更宽松，跨章节重复对学习价值伤害更大）
    pub dedup_cross_chapter_threshold: f64,
    /// 批次内重复告警阈值
    pub dedup_in_batch_threshold: f64,
    /// 选项两两相似度告警阈值
    pub option_similarity_threshold: f64,
    /// 分段滑动窗口接受阈值
    pub segment_window_threshold: f64,
    /// 语义验证最低置信度
    pub semantic_min_confidence: f64,
    // --- 分段配置 ---
    /// 单章最小长度（字符）
    pub segment_min_chars: usize,
    /// 单章最大长度（字符）
    pub segment_max_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_chapters: 5,
            questions_per_chapter: 5,
            source_folder: "source_docs".to_string(),
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "http://menshen.xdf.cn/v1".to_string(),
            ocr_api_base_url: "http://menshen.xdf.cn/ocr".to_string(),
            text_model_name: "gemini-3.0-pro-preview".to_string(),
            vision_model_name: "doubao-seed-1.6".to_string(),
            temperature: 0.3,
            max_output_tokens: 4096,
            source_truncate_chars: 12_000,
            text_breaker_failure_threshold: 5,
            text_breaker_reset_timeout_ms: 30_000,
            vision_breaker_failure_threshold: 3,
            vision_breaker_reset_timeout_ms: 60_000,
            breaker_half_open_max_attempts: 2,
            classification_cache_max_size: 500,
            classification_cache_ttl_secs: 3 * 24 * 3600,
            fact_cache_max_size: 200,
            fact_cache_ttl_secs: 24 * 3600,
            dedup_cross_chapter_threshold: 0.65,
            dedup_in_batch_threshold: 0.8,
            option_similarity_threshold: 0.85,
            segment_window_threshold: 0.5,
            semantic_min_confidence: 0.6,
            segment_min_chars: 200,
            segment_max_chars: 20_000,
        }
    }
}

impl Config {
    /// 从环境变量加载配置（缺省值见 [`Default`]）
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.max_concurrent_chapters =
            env_parse("MAX_CONCURRENT_CHAPTERS", config.max_concurrent_chapters);
        config.questions_per_chapter =
            env_parse("QUESTIONS_PER_CHAPTER", config.questions_per_chapter);
        config.verbose_logging = env_parse("VERBOSE_LOGGING", config.verbose_logging);
        config.temperature = env_parse("LLM_TEMPERATURE", config.temperature);
        config.max_output_tokens = env_parse("LLM_MAX_OUTPUT_TOKENS", config.max_output_tokens);
        config.source_truncate_chars =
            env_parse("SOURCE_TRUNCATE_CHARS", config.source_truncate_chars);

        for (var_name, field) in [
            ("SOURCE_FOLDER", &mut config.source_folder),
            ("OUTPUT_LOG_FILE", &mut config.output_log_file),
            ("LLM_API_KEY", &mut config.llm_api_key),
            ("LLM_API_BASE_URL", &mut config.llm_api_base_url),
            ("OCR_API_BASE_URL", &mut config.ocr_api_base_url),
            ("TEXT_MODEL_NAME", &mut config.text_model_name),
            ("VISION_MODEL_NAME", &mut config.vision_model_name),
        ] {
            if let Ok(value) = std::env::var(var_name) {
                *field = value;
            }
        }

        config
    }

    /// 从 TOML 文件加载配置
    ///
    /// 文件中缺失的字段取缺省值。
    pub fn from_file(path: &str) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::File(FileError::ReadFailed {
                path: path.to_string(),
                source: Box::new(e),
            })
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            AppError::File(FileError::TomlParseFailed {
                path: path.to_string(),
                source: Box::new(e),
            })
        })?;
        Ok(config)
    }
}

fn env_parse<T: std::str::FromStr>(var_name: &str, default: T) -> T {
    std::env::var(var_name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds_match_calibration() {
        let config = Config::default();
        assert_eq!(config.dedup_cross_chapter_threshold, 0.65);
        assert_eq!(config.dedup_in_batch_threshold, 0.8);
        assert_eq!(config.option_similarity_threshold, 0.85);
        assert_eq!(config.segment_window_threshold, 0.5);
        assert_eq!(config.semantic_min_confidence, 0.6);
    }

    #[test]
    fn test_from_toml_partial_file() {
        let toml_src = r#"
            max_concurrent_chapters = 3
            text_model_name = "doubao-seed-1.6"
        "#;
        let config: Config = toml::from_str(toml_src).expect("解析失败");
        assert_eq!(config.max_concurrent_chapters, 3);
        assert_eq!(config.text_model_name, "doubao-seed-1.6");
        // 未指定的字段取缺省值
        assert_eq!(config.vision_breaker_failure_threshold, 3);
    }
}
