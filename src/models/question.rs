use serde::{Deserialize, Serialize};

/// 认知层级（借用布鲁姆分类法的粗粒度版本）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CognitiveLevel {
    /// 记忆
    Remember,
    /// 理解
    Understand,
    /// 应用
    Apply,
}

impl CognitiveLevel {
    /// 获取标准标签
    pub fn as_str(self) -> &'static str {
        match self {
            CognitiveLevel::Remember => "remember",
            CognitiveLevel::Understand => "understand",
            CognitiveLevel::Apply => "apply",
        }
    }

    /// 从生成端返回的松散标签解析（支持多语言别名）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "remember" | "recall" | "recordar" | "记忆" => Some(CognitiveLevel::Remember),
            "understand" | "comprehension" | "comprender" | "理解" => {
                Some(CognitiveLevel::Understand)
            }
            "apply" | "application" | "aplicar" | "应用" => Some(CognitiveLevel::Apply),
            _ => None,
        }
    }

    /// 审计加分：层级越高加分越多（+1 ~ +3）
    pub fn audit_bonus(self) -> f64 {
        match self {
            CognitiveLevel::Remember => 1.0,
            CognitiveLevel::Understand => 2.0,
            CognitiveLevel::Apply => 3.0,
        }
    }
}

impl std::fmt::Display for CognitiveLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 生成端返回的松散题目记录
///
/// 生成模型对字段名并不忠诚：同一个概念可能出现在多个等价字段名下，
/// 字段也可能整体缺失。所有可选性集中在这一层，验证逻辑只面对
/// 规范化后的 [`Question`]。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawQuestion {
    /// 题干
    #[serde(default, alias = "prompt", alias = "stem", alias = "text")]
    pub question: Option<String>,
    /// 选项列表
    #[serde(default, alias = "choices", alias = "alternatives", alias = "answers")]
    pub options: Option<Vec<String>>,
    /// 正确选项下标（0-3）
    #[serde(
        default,
        alias = "correctIndex",
        alias = "correctOptionIndex",
        alias = "answer_index"
    )]
    pub correct_index: Option<i64>,
    /// 正确选项字母（"A"-"D"），部分模型只给这个
    #[serde(default, alias = "correctAnswer", alias = "answer_letter")]
    pub correct_letter: Option<String>,
    /// 解析说明
    #[serde(default, alias = "rationale")]
    pub explanation: Option<String>,
    /// 源文引用（支撑正确答案的原文摘录）
    #[serde(default, alias = "sourceReference", alias = "source_quote", alias = "reference")]
    pub source_reference: Option<String>,
    /// 认知层级标签
    #[serde(default, alias = "cognitiveLevel", alias = "bloomLevel")]
    pub cognitive_level: Option<String>,
    /// 考查的概念
    #[serde(default, alias = "conceptTested", alias = "concept")]
    pub concept_tested: Option<String>,
}

/// 规范化后的题目
///
/// 被接受的题目满足：恰好 4 个选项、选项两两非空且互不相同、
/// `correct_index ∈ [0, 3]`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// 题干
    pub prompt: String,
    /// 恰好 4 个选项
    pub options: Vec<String>,
    /// 正确选项下标
    pub correct_index: usize,
    /// 解析说明
    pub explanation: String,
    /// 源文引用
    pub source_reference: Option<String>,
    /// 认知层级
    pub cognitive_level: Option<CognitiveLevel>,
    /// 考查的概念
    pub concept_tested: Option<String>,
}

impl Question {
    /// 正确选项的文本
    pub fn correct_option(&self) -> &str {
        &self.options[self.correct_index]
    }

    /// 干扰项（除正确选项外的所有选项）
    pub fn distractors(&self) -> impl Iterator<Item = &String> {
        let correct = self.correct_index;
        self.options
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != correct)
            .map(|(_, opt)| opt)
    }
}

/// 问题严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// 阻断接受
    Error,
    /// 仅供参考
    Warning,
}

/// 单条验证发现
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// 出问题的字段
    pub field: &'static str,
    /// 严重程度
    pub severity: Severity,
    /// 人类可读的说明
    pub message: String,
}

impl ValidationIssue {
    pub fn error(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn warning(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

/// 结构验证结果
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// 全部发现（错误 + 警告）
    pub issues: Vec<ValidationIssue>,
    /// 自动修复后的题目（仅当修复后重新验证零错误时为 Some）
    pub fixed_question: Option<Question>,
}

impl ValidationResult {
    /// 是否通过（没有任何错误级别的发现）
    pub fn is_valid(&self) -> bool {
        !self
            .issues
            .iter()
            .any(|i| i.severity == Severity::Error)
    }

    /// 错误级别的发现
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    /// 警告级别的发现
    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }
}

/// 批量验证统计
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchValidationReport {
    /// 输入总数
    pub total: usize,
    /// 原样通过数量
    pub valid: usize,
    /// 修复后通过数量
    pub fixed: usize,
    /// 被拒绝数量
    pub rejected: usize,
    /// 因批内重复被移除的数量
    pub duplicates_removed: usize,
}
