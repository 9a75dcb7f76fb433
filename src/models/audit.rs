use serde::Serialize;

/// 不可审计哨兵值
///
/// 完全没有源文本时返回 -1 而不是 0：低分和"无数据"是两种
/// 不同的运营含义。
pub const NOT_AUDITABLE: f64 = -1.0;

/// 单题审计结果
#[derive(Debug, Clone, Serialize)]
pub struct QuestionAudit {
    /// 综合得分 [0, 100]，不可审计时为 [`NOT_AUDITABLE`]
    pub score: f64,
    /// 题干与源文的关键词相似度分量
    pub prompt_relevance: f64,
    /// 正确答案在源文中出现的置信度分量
    pub answer_grounding: f64,
    /// 干扰项干净程度分量
    pub distractor_cleanliness: f64,
    /// 检出的歧义问题数
    pub ambiguity_issues: usize,
}

/// 章节审计结果
#[derive(Debug, Clone, Serialize)]
pub struct ChapterAudit {
    /// 章节序号
    pub chapter_index: usize,
    /// 章节标题
    pub title: String,
    /// 综合得分 [0, 100] 或 [`NOT_AUDITABLE`]
    pub score: f64,
    /// 各题得分
    pub question_scores: Vec<f64>,
    /// 标题是否能在源文中找到
    pub title_found_in_source: bool,
    /// 发现的问题
    pub issues: Vec<String>,
    /// 改进建议
    pub recommendations: Vec<String>,
}

/// 整课审计结果
#[derive(Debug, Clone, Serialize)]
pub struct CourseAudit {
    /// 综合得分 [0, 100] 或 [`NOT_AUDITABLE`]
    pub score: f64,
    /// 各章审计
    pub chapters: Vec<ChapterAudit>,
    /// 课程级问题
    pub issues: Vec<String>,
    /// 课程级建议
    pub recommendations: Vec<String>,
    /// 审计时间
    pub audited_at: String,
}
