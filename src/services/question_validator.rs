//! 题目结构验证器 - 业务能力层
//!
//! 对生成端返回的松散题目记录做契约检查和自动修复。
//! 错误（error）阻断接受，警告（warning）只随结果带出去。
//! 所有可选字段的归一化都在 [`RawQuestion`] 解析层完成，
//! 这里只面对规范化输入。

use tracing::debug;

use crate::config::Config;
use crate::models::{
    BatchValidationReport, CognitiveLevel, Question, RawQuestion, Severity, ValidationIssue,
    ValidationResult,
};
use crate::services::ambiguity_detector;
use crate::utils::jaccard_similarity;

/// 题干最短长度
const MIN_PROMPT_CHARS: usize = 10;
/// 解析说明最短长度
const MIN_EXPLANATION_CHARS: usize = 10;
/// 源文引用长度区间
const SOURCE_REF_MIN_CHARS: usize = 15;
const SOURCE_REF_MAX_CHARS: usize = 300;
/// 选项数量契约
const REQUIRED_OPTIONS: usize = 4;

/// 题目结构验证器
pub struct QuestionValidator {
    /// 批内重复告警阈值
    in_batch_threshold: f64,
    /// 选项两两相似度告警阈值
    option_similarity_threshold: f64,
}

impl QuestionValidator {
    /// 创建新的验证器
    pub fn new(config: &Config) -> Self {
        Self {
            in_batch_threshold: config.dedup_in_batch_threshold,
            option_similarity_threshold: config.option_similarity_threshold,
        }
    }

    /// 验证单个题目
    ///
    /// # 参数
    /// - `raw`: 生成端返回的松散记录
    /// - `accepted`: 同一批次中已接受的题目（用于批内重复检查）
    /// - `source_text`: 章节源文本（歧义扫描用，可为空）
    pub fn validate(
        &self,
        raw: &RawQuestion,
        accepted: &[Question],
        source_text: &str,
    ) -> ValidationResult {
        let mut issues = self.structural_issues(raw);

        // 6. 批内重复检查（警告，不拒绝）
        if let Some(prompt) = &raw.question {
            for (idx, prev) in accepted.iter().enumerate() {
                let sim = jaccard_similarity(prompt, &prev.prompt);
                if sim > self.in_batch_threshold {
                    issues.push(ValidationIssue::warning(
                        "prompt",
                        format!("与本批第 {} 题重复 (相似度 {:.2})", idx + 1, sim),
                    ));
                    break;
                }
            }
        }

        // 7. 解析说明
        match &raw.explanation {
            Some(expl) if expl.trim().chars().count() >= MIN_EXPLANATION_CHARS => {}
            _ => issues.push(ValidationIssue::warning(
                "explanation",
                format!("解析说明缺失或短于 {} 字符", MIN_EXPLANATION_CHARS),
            )),
        }

        // 8. 源文引用
        match &raw.source_reference {
            Some(sr) => {
                let len = sr.trim().chars().count();
                if len < SOURCE_REF_MIN_CHARS {
                    issues.push(ValidationIssue::warning(
                        "source_reference",
                        format!("源文引用短于 {} 字符, 可信度存疑", SOURCE_REF_MIN_CHARS),
                    ));
                } else if len > SOURCE_REF_MAX_CHARS {
                    issues.push(ValidationIssue::warning(
                        "source_reference",
                        format!("源文引用超过 {} 字符, 不像字面摘录", SOURCE_REF_MAX_CHARS),
                    ));
                }
            }
            None => issues.push(ValidationIssue::warning(
                "source_reference",
                "缺少源文引用",
            )),
        }

        // 9. 认知层级枚举
        if let Some(level) = &raw.cognitive_level {
            if CognitiveLevel::parse(level).is_none() {
                issues.push(ValidationIssue::warning(
                    "cognitive_level",
                    format!("认知层级 '{}' 不在枚举内 (remember/understand/apply)", level),
                ));
            }
        }

        // 10. 选项两两相似度
        if let Some(options) = &raw.options {
            for i in 0..options.len() {
                for j in (i + 1)..options.len() {
                    let sim = jaccard_similarity(&options[i], &options[j]);
                    if sim > self.option_similarity_threshold {
                        issues.push(ValidationIssue::warning(
                            "options",
                            format!(
                                "选项 '{}' 与 '{}' 过于相似 (相似度 {:.2})",
                                options[i], options[j], sim
                            ),
                        ));
                    }
                }
            }
        }

        // 11. 歧义扫描
        if let (Some(prompt), Some(options)) = (&raw.question, &raw.options) {
            let correct = resolve_correct_index(raw);
            for finding in
                ambiguity_detector::detect_ambiguity(prompt, options, correct, source_text)
            {
                issues.push(ValidationIssue::warning("prompt", finding.message));
            }
        }

        // 有结构错误时尝试修复
        let has_errors = issues.iter().any(|i| i.severity == Severity::Error);
        let fixed_question = if has_errors {
            self.try_fix(raw).filter(|fixed| {
                // 修复后的变体必须重新验证为零错误才接受
                let refixed_raw = question_to_raw(fixed);
                let residual = self.structural_issues(&refixed_raw);
                residual.iter().all(|i| i.severity != Severity::Error)
            })
        } else {
            None
        };

        ValidationResult {
            issues,
            fixed_question,
        }
    }

    /// 批量验证
    ///
    /// 把输入划分为 原样通过 / 修复后通过 / 拒绝 三类，
    /// 只带批内重复警告的题目也被丢弃并单独计数。
    pub fn validate_batch(
        &self,
        raws: &[RawQuestion],
        source_text: &str,
    ) -> (Vec<Question>, BatchValidationReport) {
        let mut accepted: Vec<Question> = Vec::new();
        let mut report = BatchValidationReport {
            total: raws.len(),
            ..Default::default()
        };

        for (idx, raw) in raws.iter().enumerate() {
            let mut result = self.validate(raw, &accepted, source_text);

            let is_duplicate = result
                .issues
                .iter()
                .any(|i| i.severity == Severity::Warning && i.message.contains("重复"));

            if result.is_valid() {
                if is_duplicate {
                    report.duplicates_removed += 1;
                    debug!("第 {} 题因批内重复被移除", idx + 1);
                    continue;
                }
                match to_question(raw) {
                    Some(q) => {
                        accepted.push(q);
                        report.valid += 1;
                    }
                    None => report.rejected += 1,
                }
            } else if let Some(fixed) = result.fixed_question.take() {
                if is_duplicate {
                    report.duplicates_removed += 1;
                    continue;
                }
                accepted.push(fixed);
                report.fixed += 1;
                debug!("第 {} 题经自动修复后接受", idx + 1);
            } else {
                report.rejected += 1;
                debug!(
                    "第 {} 题被拒绝: {:?}",
                    idx + 1,
                    result.errors().map(|e| &e.message).collect::<Vec<_>>()
                );
            }
        }

        (accepted, report)
    }

    /// 结构检查（错误级别的 1-5 项）
    fn structural_issues(&self, raw: &RawQuestion) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        // 1. 题干存在且足够长
        match &raw.question {
            Some(prompt) if prompt.trim().chars().count() >= MIN_PROMPT_CHARS => {}
            _ => issues.push(ValidationIssue::error(
                "prompt",
                format!("题干缺失或短于 {} 字符", MIN_PROMPT_CHARS),
            )),
        }

        match &raw.options {
            Some(options) => {
                // 2. 恰好 4 个选项
                if options.len() != REQUIRED_OPTIONS {
                    issues.push(ValidationIssue::error(
                        "options",
                        format!("需要恰好 {} 个选项, 实际 {} 个", REQUIRED_OPTIONS, options.len()),
                    ));
                }
                // 3. 没有空选项
                if options.iter().any(|o| o.trim().is_empty()) {
                    issues.push(ValidationIssue::error("options", "存在空选项"));
                }
                // 4. 选项大小写不敏感地互不相同
                let mut seen: Vec<String> = Vec::new();
                for opt in options {
                    let lower = opt.trim().to_lowercase();
                    if !lower.is_empty() && seen.contains(&lower) {
                        issues.push(ValidationIssue::error(
                            "options",
                            format!("选项重复: '{}'", opt),
                        ));
                        break;
                    }
                    seen.push(lower);
                }
            }
            None => issues.push(ValidationIssue::error("options", "缺少选项列表")),
        }

        // 5. 正确选项下标可解析
        if resolve_correct_index(raw).is_none() {
            issues.push(ValidationIssue::error(
                "correct_index",
                "正确选项无法解析 (下标 0-3 或字母 A-D 均缺失)",
            ));
        }

        issues
    }

    /// 尝试修复结构错误
    ///
    /// 选项不足补占位、过多截断；正确下标解析不出来缺省为 0。
    /// 题干本身缺失的题目没有修复价值，直接放弃。
    fn try_fix(&self, raw: &RawQuestion) -> Option<Question> {
        let prompt = raw.question.as_ref()?.trim().to_string();
        if prompt.chars().count() < MIN_PROMPT_CHARS {
            return None;
        }

        let mut options: Vec<String> = raw
            .options
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|o| o.trim().to_string())
            .collect();

        // 空选项替换为占位文本
        for (i, opt) in options.iter_mut().enumerate() {
            if opt.is_empty() {
                *opt = format!("N/A ({})", i + 1);
            }
        }
        // 截断或补齐到恰好 4 个
        options.truncate(REQUIRED_OPTIONS);
        let mut next = options.len();
        while options.len() < REQUIRED_OPTIONS {
            options.push(format!("N/A ({})", next + 1));
            next += 1;
        }

        let correct_index = resolve_correct_index(raw)
            .filter(|i| *i < options.len())
            .unwrap_or(0);

        Some(Question {
            prompt,
            options,
            correct_index,
            explanation: raw.explanation.clone().unwrap_or_default(),
            source_reference: raw.source_reference.clone(),
            cognitive_level: raw.cognitive_level.as_deref().and_then(CognitiveLevel::parse),
            concept_tested: raw.concept_tested.clone(),
        })
    }
}

/// 解析正确选项下标
///
/// 先看整数下标字段，再退回单字母 "A"-"D" 字段。
pub fn resolve_correct_index(raw: &RawQuestion) -> Option<usize> {
    if let Some(idx) = raw.correct_index {
        if (0..REQUIRED_OPTIONS as i64).contains(&idx) {
            return Some(idx as usize);
        }
    }
    if let Some(letter) = &raw.correct_letter {
        let upper = letter.trim().to_uppercase();
        return match upper.as_str() {
            "A" => Some(0),
            "B" => Some(1),
            "C" => Some(2),
            "D" => Some(3),
            _ => None,
        };
    }
    None
}

/// 结构已合法的记录转为规范题目
fn to_question(raw: &RawQuestion) -> Option<Question> {
    let prompt = raw.question.as_ref()?.trim().to_string();
    let options = raw.options.clone()?;
    let correct_index = resolve_correct_index(raw)?;
    if options.len() != REQUIRED_OPTIONS || correct_index >= options.len() {
        return None;
    }
    Some(Question {
        prompt,
        options,
        correct_index,
        explanation: raw.explanation.clone().unwrap_or_default(),
        source_reference: raw.source_reference.clone(),
        cognitive_level: raw.cognitive_level.as_deref().and_then(CognitiveLevel::parse),
        concept_tested: raw.concept_tested.clone(),
    })
}

/// 规范题目转回松散记录（修复后重新验证用）
fn question_to_raw(q: &Question) -> RawQuestion {
    RawQuestion {
        question: Some(q.prompt.clone()),
        options: Some(q.options.clone()),
        correct_index: Some(q.correct_index as i64),
        correct_letter: None,
        explanation: if q.explanation.is_empty() {
            None
        } else {
            Some(q.explanation.clone())
        },
        source_reference: q.source_reference.clone(),
        cognitive_level: q.cognitive_level.map(|l| l.as_str().to_string()),
        concept_tested: q.concept_tested.clone(),
    }
}
