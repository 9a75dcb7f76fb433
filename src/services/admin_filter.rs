//! 行政内容过滤器 - 业务能力层
//!
//! 识别并移除考课程后勤而不是学科内容的题目（"期末考试有几部分"、
//! "课程目标是什么"这类）。先过高精度正则，再过三个语言的关键词表，
//! 首个命中即定性；全都不中就不是行政内容。

use anyhow::Result;
use regex::Regex;
use tracing::{debug, info};

use crate::keywords;
use crate::models::{Lang, Question};

/// 分类结论
#[derive(Debug, Clone)]
pub struct AdminClassification {
    /// 是否为行政内容
    pub is_admin: bool,
    /// 命中原因（规则描述）
    pub reason: Option<String>,
    /// 命中的关键词（关键词表路径时有值）
    pub matched_keyword: Option<String>,
}

impl AdminClassification {
    fn subject_matter() -> Self {
        Self {
            is_admin: false,
            reason: None,
            matched_keyword: None,
        }
    }
}

/// 批量过滤统计
#[derive(Debug, Clone, Default)]
pub struct AdminBatchReport {
    /// 输入总数
    pub total: usize,
    /// 移除数量
    pub removed: usize,
    /// 每条被移除题目的原因（审计日志用）
    pub reasons: Vec<String>,
}

/// 行政内容过滤器
///
/// 正则在构造时编译一次（大小写不敏感），分类本身是纯函数。
pub struct AdminFilter {
    patterns: Vec<(Lang, Regex)>,
}

impl AdminFilter {
    /// 创建新的过滤器
    pub fn new() -> Result<Self> {
        let mut patterns = Vec::new();
        for lang in [Lang::English, Lang::Spanish, Lang::Chinese] {
            for pat in keywords::admin_patterns(lang) {
                let re = Regex::new(&format!("(?i){}", pat))?;
                patterns.push((lang, re));
            }
        }
        Ok(Self { patterns })
    }

    /// 分类一段题目文本
    pub fn classify(&self, text: &str) -> AdminClassification {
        let lower = text.to_lowercase();

        // 第一档：高精度正则，首个命中即定性
        for (lang, re) in &self.patterns {
            if re.is_match(&lower) {
                return AdminClassification {
                    is_admin: true,
                    reason: Some(format!("命中 {} 行政模式: {}", lang.code(), re.as_str())),
                    matched_keyword: None,
                };
            }
        }

        // 第二档：三个语言的关键词表
        for lang in [Lang::English, Lang::Spanish, Lang::Chinese] {
            if let Some(kw) = keywords::contains_any(&lower, keywords::admin_keywords(lang)) {
                return AdminClassification {
                    is_admin: true,
                    reason: Some(format!("命中 {} 行政关键词", lang.code())),
                    matched_keyword: Some(kw.to_string()),
                };
            }
        }

        AdminClassification::subject_matter()
    }

    /// 批量过滤：移除行政内容题目，返回存活列表和统计
    pub fn filter_batch(&self, questions: Vec<Question>) -> (Vec<Question>, AdminBatchReport) {
        let mut report = AdminBatchReport {
            total: questions.len(),
            ..Default::default()
        };

        let mut survivors = Vec::with_capacity(questions.len());
        for q in questions {
            let verdict = self.classify(&q.prompt);
            if verdict.is_admin {
                report.removed += 1;
                let reason = verdict.reason.unwrap_or_else(|| "未知原因".to_string());
                debug!("🧹 移除行政内容题目: '{}' ({})", q.prompt, reason);
                report.reasons.push(reason);
            } else {
                survivors.push(q);
            }
        }

        if report.removed > 0 {
            info!(
                "🧹 行政内容过滤: 移除 {}/{} 道题",
                report.removed, report.total
            );
        }

        (survivors, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> AdminFilter {
        AdminFilter::new().expect("正则编译失败")
    }

    #[test]
    fn test_exam_parts_is_admin() {
        let verdict = filter().classify("How many parts does the final exam have?");
        assert!(verdict.is_admin);
        assert!(verdict.reason.is_some());
    }

    #[test]
    fn test_subject_matter_is_not_admin() {
        let verdict = filter().classify("What is the formula for WACC?");
        assert!(!verdict.is_admin);
        assert!(verdict.reason.is_none());
    }

    #[test]
    fn test_keyword_path_spanish() {
        let verdict = filter().classify("¿Qué capítulos cubre el libro de texto obligatorio?");
        assert!(verdict.is_admin);
        assert_eq!(verdict.matched_keyword.as_deref(), Some("libro de texto"));
    }

    #[test]
    fn test_keyword_path_chinese() {
        let verdict = filter().classify("本学期的课程大纲在哪里下载？");
        assert!(verdict.is_admin);
        assert_eq!(verdict.matched_keyword.as_deref(), Some("课程大纲"));
    }

    #[test]
    fn test_regex_beats_keywords() {
        // 两档都能命中时, 报出来的是正则档
        let verdict = filter().classify("How many parts does the exam have, according to the syllabus?");
        assert!(verdict.is_admin);
        assert!(verdict.matched_keyword.is_none());
    }

    #[test]
    fn test_filter_batch_removes_and_reports() {
        let make = |prompt: &str| Question {
            prompt: prompt.to_string(),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_index: 0,
            explanation: String::new(),
            source_reference: None,
            cognitive_level: None,
            concept_tested: None,
        };

        let questions = vec![
            make("What is the formula for WACC?"),
            make("When is the final exam scheduled?"),
            make("Which shock triggered the merger wave of the 1990s?"),
        ];

        let (survivors, report) = filter().filter_batch(questions);
        assert_eq!(report.total, 3);
        assert_eq!(report.removed, 1);
        assert_eq!(survivors.len(), 2);
        assert_eq!(report.reasons.len(), 1);
    }
}
