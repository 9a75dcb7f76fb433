use serde::{Deserialize, Serialize};

/// 章节元数据
///
/// 生成阶段之前由上游产出的抽象章节描述，分段器负责把它
/// 对齐回原始源文本。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterMeta {
    /// 章节标题
    pub title: String,
    /// 章节摘要（可选，滑动窗口匹配的备用信号）
    #[serde(default)]
    pub summary: Option<String>,
    /// 声明的关键概念（可选，同上）
    #[serde(default)]
    pub key_concepts: Vec<String>,
}

impl ChapterMeta {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: None,
            key_concepts: Vec::new(),
        }
    }
}

/// 解析出的章节文本跨度
///
/// 不变式：`0 <= start < end <= 源文本长度`，相邻章节的跨度不重叠。
/// 位置一律是字节偏移，且落在字符边界上。
#[derive(Debug, Clone, Serialize)]
pub struct ChapterBoundary {
    /// 章节序号（与输入元数据的顺序一致）
    pub index: usize,
    /// 章节标题
    pub title: String,
    /// 起始位置（字节偏移）
    pub start_position: usize,
    /// 结束位置（字节偏移，不含）
    pub end_position: usize,
    /// 该跨度的文本
    pub text: String,
    /// 定位方式（供日志和审计使用）
    pub strategy: BoundaryStrategy,
}

/// 章节位置的定位方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryStrategy {
    /// 标题精确匹配（大小写不敏感）
    ExactTitle,
    /// 重音归一化后匹配
    AccentFolded,
    /// 标题显著词正则匹配
    TokenRegex,
    /// 滑动窗口相似度匹配
    WindowOverlap,
    /// 最长显著词检索
    LongestWord,
    /// 按邻居线性插值
    Interpolated,
    /// 标记辅助等分
    EqualDivision,
}

impl BoundaryStrategy {
    /// 是否为直接定位（非推算）得到的位置
    pub fn is_resolved(self) -> bool {
        !matches!(
            self,
            BoundaryStrategy::Interpolated | BoundaryStrategy::EqualDivision
        )
    }
}
