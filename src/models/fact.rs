use serde::{Deserialize, Serialize};

/// 事实类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactCategory {
    /// 定义
    Definition,
    /// 公式
    Formula,
    /// 过程
    Process,
    /// 关系
    Relationship,
    /// 统计数据
    Statistic,
    /// 例子
    Example,
}

impl FactCategory {
    /// 从生成端的松散标签解析，解析不了时归入 Definition
    pub fn parse_lossy(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "formula" | "fórmula" | "公式" => FactCategory::Formula,
            "process" | "proceso" | "过程" | "步骤" => FactCategory::Process,
            "relationship" | "relación" | "关系" => FactCategory::Relationship,
            "statistic" | "estadística" | "数据" | "统计" => FactCategory::Statistic,
            "example" | "ejemplo" | "例子" | "示例" => FactCategory::Example,
            _ => FactCategory::Definition,
        }
    }
}

/// 从源文本抽取出的原子可验证事实
///
/// 不变式：`source_quote` 必须是其来源文本的字面摘录，
/// 抽取服务会丢弃不满足这一条的事实。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    /// 事实编号（章节内唯一）
    pub id: String,
    /// 原子陈述
    pub statement: String,
    /// 支撑该陈述的字面原文摘录
    pub source_quote: String,
    /// 类别
    pub category: FactCategory,
    /// 抽取置信度 [0, 1]
    pub confidence: f64,
    /// 关键词列表
    pub keywords: Vec<String>,
}

/// 单个题目的语义验证结果
#[derive(Debug, Clone, Serialize)]
pub struct SemanticValidationResult {
    /// 是否接受
    pub is_valid: bool,
    /// 置信度 [0, 1]；低于配置阈值时强制 is_valid=false
    pub confidence: f64,
    /// 命中的事实编号
    pub matched_fact_ids: Vec<String>,
    /// 问题描述（如 "weak match"）
    pub issues: Vec<String>,
}

/// 批量语义验证统计
#[derive(Debug, Clone, Default, Serialize)]
pub struct SemanticBatchReport {
    /// 输入总数
    pub total: usize,
    /// 通过数量
    pub passed: usize,
    /// 未通过数量
    pub failed: usize,
    /// 升级到模型裁决的次数
    pub escalations: usize,
    /// 平均置信度
    pub mean_confidence: f64,
}
