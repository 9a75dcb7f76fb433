//! 质量审计服务 - 业务能力层
//!
//! 事后评分：把已生成的章节/题目对照源文本打 0-100 分并给出
//! 人类可读的改进建议。审计永远不阻断任何流程，只在持久化之后
//! 作为报告跑一遍。
//!
//! 完全没有源文本时返回哨兵值 -1（"不可审计"）而不是 0：
//! 低分和无数据是两种不同的运营含义。

use tracing::info;

use crate::models::{ChapterAudit, CourseAudit, Question, QuestionAudit, NOT_AUDITABLE};
use crate::services::ambiguity_detector;
use crate::utils::{overlap_ratio, tokenize};

/// 题干相关性权重
const W_PROMPT: f64 = 30.0;
/// 答案可溯源权重
const W_ANSWER: f64 = 35.0;
/// 干扰项干净程度起始分
const W_DISTRACTOR: f64 = 25.0;
/// 每个"也能在源文中坐实"的干扰项扣分
const DISTRACTOR_PENALTY: f64 = 8.0;
/// 无歧义满额奖励
const W_AMBIGUITY_BONUS: f64 = 10.0;
/// 可验证源文引用的固定加分
const REF_BONUS: f64 = 5.0;

/// 干扰项在源文中"高置信度出现"的判定线
const DISTRACTOR_PRESENT: f64 = 0.7;
/// 章节聚合权重：题目均分 60% + 标题可寻 25% + 题量适当 15%
const W_CHAPTER_QUESTIONS: f64 = 0.60;
const W_CHAPTER_TITLE: f64 = 0.25;
const W_CHAPTER_COUNT: f64 = 0.15;
/// 低分题占比告警线
const LOW_SCORE_CUTOFF: f64 = 40.0;
const LOW_SCORE_RATIO: f64 = 0.2;

/// 质量审计服务
#[derive(Default)]
pub struct AuditService;

impl AuditService {
    /// 创建新的审计服务
    pub fn new() -> Self {
        Self
    }

    /// 审计单个题目
    pub fn audit_question(&self, question: &Question, source_text: &str) -> QuestionAudit {
        if source_text.trim().is_empty() {
            return QuestionAudit {
                score: NOT_AUDITABLE,
                prompt_relevance: 0.0,
                answer_grounding: 0.0,
                distractor_cleanliness: 0.0,
                ambiguity_issues: 0,
            };
        }

        let source_lower = source_text.to_lowercase();
        let source_tokens = tokenize(source_text);

        // (a) 题干与源文的关键词重叠
        let prompt_relevance = overlap_ratio(&question.prompt, source_text);

        // (b) 正确答案（或其源文引用）在源文中出现的置信度
        let answer_conf = text_in_source(question.correct_option(), &source_lower, &source_tokens);
        let ref_conf = question
            .source_reference
            .as_deref()
            .map(|r| text_in_source(r, &source_lower, &source_tokens))
            .unwrap_or(0.0);
        let answer_grounding = answer_conf.max(ref_conf);

        // (c) 干扰项干净程度：干扰项自己也能在源文中坐实是坏信号,
        //     说明这道题可能不止一个说得通的答案
        let confirmed_distractors = question
            .distractors()
            .filter(|d| text_in_source(d, &source_lower, &source_tokens) > DISTRACTOR_PRESENT)
            .count();
        let distractor_cleanliness =
            (W_DISTRACTOR - DISTRACTOR_PENALTY * confirmed_distractors as f64).max(0.0);

        // (d) 无歧义奖励, 每条检出问题递减
        let ambiguity_issues = ambiguity_detector::detect_ambiguity(
            &question.prompt,
            &question.options,
            Some(question.correct_index),
            source_text,
        )
        .len();
        let ambiguity_bonus =
            (W_AMBIGUITY_BONUS - 4.0 * ambiguity_issues as f64).max(0.0);

        let mut score = prompt_relevance * W_PROMPT
            + answer_grounding * W_ANSWER
            + distractor_cleanliness
            + ambiguity_bonus;

        // 固定加分：可验证的源文引用 + 认知层级
        if ref_conf > 0.9 {
            score += REF_BONUS;
        }
        if let Some(level) = question.cognitive_level {
            score += level.audit_bonus();
        }

        QuestionAudit {
            score: score.clamp(0.0, 100.0),
            prompt_relevance,
            answer_grounding,
            distractor_cleanliness,
            ambiguity_issues,
        }
    }

    /// 审计一个章节
    pub fn audit_chapter(
        &self,
        chapter_index: usize,
        title: &str,
        questions: &[Question],
        source_text: &str,
    ) -> ChapterAudit {
        if source_text.trim().is_empty() {
            return ChapterAudit {
                chapter_index,
                title: title.to_string(),
                score: NOT_AUDITABLE,
                question_scores: Vec::new(),
                title_found_in_source: false,
                issues: vec!["没有可用的源文本, 无法审计".to_string()],
                recommendations: Vec::new(),
            };
        }

        let question_scores: Vec<f64> = questions
            .iter()
            .map(|q| self.audit_question(q, source_text).score)
            .collect();
        let question_avg = if question_scores.is_empty() {
            0.0
        } else {
            question_scores.iter().sum::<f64>() / question_scores.len() as f64
        };

        let title_found = source_text.to_lowercase().contains(&title.to_lowercase())
            || overlap_ratio(title, source_text) >= 0.8;
        let count_score = question_count_score(questions.len());

        let title_term = if title_found { 100.0 } else { 0.0 };
        let score = question_avg * W_CHAPTER_QUESTIONS
            + title_term * W_CHAPTER_TITLE
            + count_score * 100.0 * W_CHAPTER_COUNT;

        let mut issues = Vec::new();
        let mut recommendations = Vec::new();

        if !title_found {
            issues.push(format!("章节标题 '{}' 在源文中找不到", title));
            recommendations.push("核对章节划分是否与源文档实际结构一致".to_string());
        }

        let low_count = question_scores
            .iter()
            .filter(|s| **s < LOW_SCORE_CUTOFF)
            .count();
        if !question_scores.is_empty()
            && low_count as f64 / question_scores.len() as f64 > LOW_SCORE_RATIO
        {
            issues.push(format!(
                "{}/{} 道题得分低于 {}",
                low_count,
                question_scores.len(),
                LOW_SCORE_CUTOFF
            ));
            recommendations.push("建议对该章节重新生成题目并收紧语义验证阈值".to_string());
        }

        if questions.is_empty() {
            issues.push("章节没有任何题目".to_string());
            recommendations.push("检查生成调用是否被熔断或全部被过滤".to_string());
        }

        ChapterAudit {
            chapter_index,
            title: title.to_string(),
            score: score.clamp(0.0, 100.0),
            question_scores,
            title_found_in_source: title_found,
            issues,
            recommendations,
        }
    }

    /// 聚合整课审计
    pub fn audit_course(&self, chapters: Vec<ChapterAudit>) -> CourseAudit {
        let auditable: Vec<&ChapterAudit> = chapters
            .iter()
            .filter(|c| c.score >= 0.0)
            .collect();

        let score = if auditable.is_empty() {
            NOT_AUDITABLE
        } else {
            auditable.iter().map(|c| c.score).sum::<f64>() / auditable.len() as f64
        };

        let mut issues = Vec::new();
        let mut recommendations = Vec::new();

        let missing_titles = auditable
            .iter()
            .filter(|c| !c.title_found_in_source)
            .count();
        if missing_titles > 0 {
            issues.push(format!("{} 个章节的标题在源文中找不到", missing_titles));
            recommendations.push("重新运行分段并人工抽查章节边界".to_string());
        }

        let weak_chapters = auditable.iter().filter(|c| c.score < 60.0).count();
        if weak_chapters > 0 {
            issues.push(format!("{} 个章节综合得分低于 60", weak_chapters));
            recommendations.push("优先重生成低分章节的内容".to_string());
        }

        info!(
            "🧾 课程审计完成: 综合得分 {:.1} ({} 个章节)",
            score,
            chapters.len()
        );

        CourseAudit {
            score,
            chapters,
            issues,
            recommendations,
            audited_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// 一段文本在源文中出现的置信度
///
/// 逐字出现为 1.0, 否则退化为内容 token 的覆盖比例。
fn text_in_source(
    text: &str,
    source_lower: &str,
    source_tokens: &std::collections::HashSet<String>,
) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if source_lower.contains(&trimmed.to_lowercase()) {
        return 1.0;
    }
    let tokens = tokenize(trimmed);
    if tokens.is_empty() {
        return 0.0;
    }
    let present = tokens.iter().filter(|t| source_tokens.contains(*t)).count();
    present as f64 / tokens.len() as f64
}

/// 题量适当度 [0, 1]
fn question_count_score(count: usize) -> f64 {
    match count {
        0 => 0.0,
        1..=2 => 0.6,
        3..=12 => 1.0,
        _ => 0.7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CognitiveLevel;

    fn source() -> String {
        let mut s = String::from(
            "Mergers and Acquisitions. Merger waves are triggered by industry-level economic \
             shocks. Deregulation expanded the set of feasible deals in banking. ",
        );
        s.push_str(&"Additional prose about valuation, discounting and capital structure. ".repeat(5));
        s
    }

    fn grounded_question() -> Question {
        Question {
            prompt: "What triggers merger waves according to the chapter?".to_string(),
            options: vec![
                "Industry-level economic shocks".to_string(),
                "Random managerial whims".to_string(),
                "Astrological cycles".to_string(),
                "Weather patterns".to_string(),
            ],
            correct_index: 0,
            explanation: "Shocks reshape industry structure and trigger deal waves.".to_string(),
            source_reference: Some(
                "Merger waves are triggered by industry-level economic shocks.".to_string(),
            ),
            cognitive_level: Some(CognitiveLevel::Understand),
            concept_tested: Some("merger waves".to_string()),
        }
    }

    fn ungrounded_question() -> Question {
        Question {
            prompt: "Qual é a cidade administrativa da Oceania fictícia?".to_string(),
            options: vec![
                "Cidade Alfa".to_string(),
                "Cidade Beta".to_string(),
                "Cidade Gama".to_string(),
                "Cidade Delta".to_string(),
            ],
            correct_index: 0,
            explanation: String::new(),
            source_reference: None,
            cognitive_level: None,
            concept_tested: None,
        }
    }

    #[test]
    fn test_no_source_returns_sentinel() {
        let audit = AuditService::new().audit_question(&grounded_question(), "");
        assert_eq!(audit.score, NOT_AUDITABLE);
    }

    #[test]
    fn test_grounded_question_scores_high() {
        let audit = AuditService::new().audit_question(&grounded_question(), &source());
        assert!(audit.score > 70.0, "实际得分: {}", audit.score);
        assert!(audit.answer_grounding > 0.9);
    }

    #[test]
    fn test_ungrounded_question_scores_low() {
        let audit = AuditService::new().audit_question(&ungrounded_question(), &source());
        assert!(audit.score < 40.0, "实际得分: {}", audit.score);
    }

    #[test]
    fn test_confirmed_distractor_penalized() {
        let mut q = grounded_question();
        // 把一个干扰项改成源文里坐实的内容
        q.options[1] = "Deregulation expanded the set of feasible deals".to_string();
        let clean = AuditService::new().audit_question(&grounded_question(), &source());
        let dirty = AuditService::new().audit_question(&q, &source());
        assert!(dirty.distractor_cleanliness < clean.distractor_cleanliness);
    }

    #[test]
    fn test_chapter_audit_aggregates() {
        let svc = AuditService::new();
        let questions = vec![grounded_question(), grounded_question(), grounded_question()];
        let audit = svc.audit_chapter(0, "Mergers and Acquisitions", &questions, &source());

        assert!(audit.title_found_in_source);
        assert!(audit.score > 60.0, "实际得分: {}", audit.score);
        assert_eq!(audit.question_scores.len(), 3);
    }

    #[test]
    fn test_chapter_missing_title_reported() {
        let svc = AuditService::new();
        let audit = svc.audit_chapter(1, "Chapter That Does Not Exist", &[grounded_question()], &source());
        assert!(!audit.title_found_in_source);
        assert!(audit.issues.iter().any(|i| i.contains("找不到")));
        assert!(!audit.recommendations.is_empty());
    }

    #[test]
    fn test_course_audit_sentinel_when_nothing_auditable() {
        let svc = AuditService::new();
        let ch = svc.audit_chapter(0, "任意章节", &[grounded_question()], "");
        let course = svc.audit_course(vec![ch]);
        assert_eq!(course.score, NOT_AUDITABLE);
    }

    #[test]
    fn test_course_audit_flags_weak_chapters() {
        let svc = AuditService::new();
        let weak = svc.audit_chapter(0, "Unfindable Title", &[ungrounded_question()], &source());
        let course = svc.audit_course(vec![weak]);
        assert!(course.score >= 0.0);
        assert!(!course.issues.is_empty());
    }

    #[test]
    fn test_question_count_score_bands() {
        assert_eq!(question_count_score(0), 0.0);
        assert_eq!(question_count_score(2), 0.6);
        assert_eq!(question_count_score(5), 1.0);
        assert_eq!(question_count_score(30), 0.7);
    }
}
