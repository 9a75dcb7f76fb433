use std::fmt;
use std::time::Duration;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// LLM 调用错误
    Llm(LlmError),
    /// 熔断器错误
    Circuit(CircuitOpenError),
    /// 内容质量错误
    Content(ContentError),
    /// 文件操作错误
    File(FileError),
    /// 配置错误
    Config(ConfigError),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Llm(e) => write!(f, "LLM错误: {}", e),
            AppError::Circuit(e) => write!(f, "熔断错误: {}", e),
            AppError::Content(e) => write!(f, "内容错误: {}", e),
            AppError::File(e) => write!(f, "文件错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::Other(msg) => write!(f, "错误: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Llm(e) => Some(e),
            AppError::Circuit(e) => Some(e),
            AppError::Content(e) => Some(e),
            AppError::File(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Other(_) => None,
        }
    }
}

/// 视为瞬时故障的 HTTP 状态码
pub const TRANSIENT_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// LLM 调用错误
#[derive(Debug)]
pub enum LlmError {
    /// API 调用失败
    ApiCallFailed {
        model: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// API 返回了错误状态码
    BadStatus {
        status: u16,
        message: Option<String>,
    },
    /// 请求频率限制
    RateLimited {
        retry_after: Option<u64>,
    },
    /// 请求超时
    Timeout {
        elapsed_ms: u64,
    },
    /// 网络连接被重置
    ConnectionReset,
    /// 返回内容为空
    EmptyContent {
        model: String,
    },
    /// 结构化输出解析失败
    JsonParseFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ApiCallFailed { model, source } => {
                write!(f, "LLM API调用失败 (模型: {}): {}", model, source)
            }
            LlmError::BadStatus { status, message } => {
                write!(f, "LLM API返回错误状态码 {}: {:?}", status, message)
            }
            LlmError::RateLimited { retry_after } => {
                write!(f, "LLM API请求频率限制, 建议等待: {:?}秒", retry_after)
            }
            LlmError::Timeout { elapsed_ms } => {
                write!(f, "LLM API请求超时 (已等待 {}ms)", elapsed_ms)
            }
            LlmError::ConnectionReset => write!(f, "网络连接被重置"),
            LlmError::EmptyContent { model } => {
                write!(f, "LLM返回内容为空 (模型: {})", model)
            }
            LlmError::JsonParseFailed { source } => {
                write!(f, "LLM结构化输出解析失败: {}", source)
            }
        }
    }
}

impl std::error::Error for LlmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LlmError::ApiCallFailed { source, .. } | LlmError::JsonParseFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

impl LlmError {
    /// 是否为瞬时故障（可以重试）
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::BadStatus { status, .. } => TRANSIENT_STATUS_CODES.contains(status),
            LlmError::RateLimited { .. } => true,
            LlmError::Timeout { .. } => true,
            LlmError::ConnectionReset => true,
            // 消息体匹配 "rate limit" / "timeout" 也视为瞬时故障
            LlmError::ApiCallFailed { source, .. } => message_looks_transient(&source.to_string()),
            _ => false,
        }
    }
}

/// 熔断器打开错误
///
/// 熔断器打开期间的调用会立即收到此错误（除非调用方提供了兜底）。
#[derive(Debug, thiserror::Error)]
#[error("依赖 {dependency} 的熔断器处于打开状态, 剩余冷却时间 {remaining:?}")]
pub struct CircuitOpenError {
    /// 被保护的下游依赖名称
    pub dependency: String,
    /// 距离进入半开状态的剩余时间
    pub remaining: Duration,
}

/// 内容质量错误
///
/// 注意：内容质量问题通常不会作为硬错误抛出（题目会被修复或丢弃），
/// 此类错误只在整个批次都不可用等极端情况下出现。
#[derive(Debug)]
pub enum ContentError {
    /// 整个批次验证后为空
    EmptyBatch {
        chapter_index: usize,
    },
    /// 源文本为空或过短
    SourceTextTooShort {
        len: usize,
    },
    /// 章节元数据为空
    EmptyChapterList,
}

impl fmt::Display for ContentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentError::EmptyBatch { chapter_index } => {
                write!(f, "章节 {} 的题目批次验证后为空", chapter_index)
            }
            ContentError::SourceTextTooShort { len } => {
                write!(f, "源文本过短 ({} 字符), 无法处理", len)
            }
            ContentError::EmptyChapterList => write!(f, "章节列表不能为空"),
        }
    }
}

impl std::error::Error for ContentError {}

/// 文件操作错误
#[derive(Debug)]
pub enum FileError {
    /// 文件不存在
    NotFound {
        path: String,
    },
    /// 读取文件失败
    ReadFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// TOML 解析失败
    TomlParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::NotFound { path } => write!(f, "文件不存在: {}", path),
            FileError::ReadFailed { path, source } => {
                write!(f, "读取文件失败 ({}): {}", path, source)
            }
            FileError::WriteFailed { path, source } => {
                write!(f, "写入文件失败 ({}): {}", path, source)
            }
            FileError::TomlParseFailed { path, source } => {
                write!(f, "TOML解析失败 ({}): {}", path, source)
            }
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::ReadFailed { source, .. }
            | FileError::WriteFailed { source, .. }
            | FileError::TomlParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 环境变量解析失败
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置值非法
    InvalidValue {
        field: String,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EnvVarParseFailed {
                var_name,
                value,
                expected_type,
            } => {
                write!(
                    f,
                    "环境变量 {} 解析失败: 值 '{}' 无法转换为 {}",
                    var_name, value, expected_type
                )
            }
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "配置项 {} 非法: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ========== 瞬时故障分类 ==========

/// 错误消息是否带有瞬时故障特征（大小写不敏感）
fn message_looks_transient(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    lower.contains("rate limit")
        || lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("connection reset")
        || TRANSIENT_STATUS_CODES
            .iter()
            .any(|code| lower.contains(&code.to_string()))
}

/// 判断一个 anyhow 错误是否可以重试
///
/// 优先使用错误链中的结构化信息（[`LlmError::is_transient`]），
/// 否则退化为消息文本匹配。熔断器打开错误永远不可重试，
/// 重试只会延长冷却期。
pub fn is_retryable(err: &anyhow::Error) -> bool {
    for cause in err.chain() {
        if cause.downcast_ref::<CircuitOpenError>().is_some() {
            return false;
        }
        if let Some(app_err) = cause.downcast_ref::<AppError>() {
            return match app_err {
                AppError::Llm(e) => e.is_transient(),
                _ => false,
            };
        }
        if let Some(llm_err) = cause.downcast_ref::<LlmError>() {
            return llm_err.is_transient();
        }
    }
    message_looks_transient(&err.to_string())
}

// ========== 从常见错误类型转换 ==========

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Llm(LlmError::JsonParseFailed {
            source: Box::new(err),
        })
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::File(FileError::TomlParseFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建LLM API调用错误
    pub fn llm_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }

    /// 创建熔断器打开错误
    pub fn circuit_open(dependency: impl Into<String>, remaining: Duration) -> Self {
        AppError::Circuit(CircuitOpenError {
            dependency: dependency.into(),
            remaining,
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
