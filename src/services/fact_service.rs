//! 事实抽取与语义验证服务 - 业务能力层
//!
//! 两件事：
//! 1. 从章节源文本抽取原子可验证事实（走 LLM，熔断+重试包裹，
//!    彻底失败时兜底为空事实列表, 生成流程降级为无依据继续，不阻塞）
//! 2. 检查生成的题目答案是否有源文依据。先走零成本的关键词启发式，
//!    只有启发式拿不定主意才升级为模型裁决（省钱的短路）

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::infrastructure::{make_cache_key, RetryPolicy};
use crate::models::{
    Fact, FactCategory, Lang, Question, SemanticBatchReport, SemanticValidationResult,
};
use crate::services::generation_service::GenerationService;
use crate::utils::{overlap_ratio, tokenize, truncate_chars};

/// 可信源文引用的长度区间（字符）
const PLAUSIBLE_REF_MIN: usize = 15;
const PLAUSIBLE_REF_MAX: usize = 300;

/// 启发式强匹配：≥2 个共享关键词
const STRONG_KEYWORD_MATCHES: usize = 2;
/// 启发式强匹配：≥30% token 重叠
const STRONG_OVERLAP: f64 = 0.30;
/// 启发式弱匹配下限
const WEAK_OVERLAP: f64 = 0.15;

/// 生成端返回的松散事实记录
#[derive(Debug, Deserialize)]
struct RawFact {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, alias = "claim", alias = "fact")]
    statement: Option<String>,
    #[serde(default, alias = "quote", alias = "sourceQuote", alias = "source_excerpt")]
    source_quote: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    keywords: Vec<String>,
}

/// 模型裁决的结构化输出
#[derive(Debug, Deserialize)]
struct AdjudicationVerdict {
    #[serde(default, alias = "is_supported")]
    supported: bool,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default, alias = "distractors_clearly_wrong")]
    distractors_wrong: Option<bool>,
}

/// 事实抽取与语义验证服务
pub struct FactService {
    generation: Arc<GenerationService>,
    min_confidence: f64,
    source_truncate_chars: usize,
}

impl FactService {
    /// 创建新的服务
    pub fn new(config: &Config, generation: Arc<GenerationService>) -> Self {
        Self {
            generation,
            min_confidence: config.semantic_min_confidence,
            source_truncate_chars: config.source_truncate_chars,
        }
    }

    // ========== 事实抽取 ==========

    /// 从章节源文本抽取原子事实
    ///
    /// 抽取失败时返回空列表：生成流程宁可无依据继续，也不因此阻塞。
    /// 结果按（章节标题 + 源文）缓存一天。
    pub async fn extract_facts(
        &self,
        source_text: &str,
        chapter_title: &str,
        lang: Lang,
    ) -> Vec<Fact> {
        let truncated = truncate_chars(source_text, self.source_truncate_chars);
        let cache_key = make_cache_key(&serde_json::json!({
            "function": "extract_facts",
            "title": chapter_title,
            "source": truncated,
        }));

        if let Some(facts) = self.generation.caches().facts.get(&cache_key) {
            debug!("📚 事实抽取命中缓存: {} ({} 条)", chapter_title, facts.len());
            return facts;
        }

        let prompt = build_extraction_prompt(truncated, chapter_title, lang);
        let system = "你是一个严谨的教育内容事实抽取助手。只输出 JSON 数组，不要输出任何其他内容。";

        let result = self
            .generation
            .generate_text("extract_facts", &prompt, Some(system), &RetryPolicy::critical())
            .await;

        match result {
            Ok(output) => {
                let facts = parse_facts(&output.content, truncated);
                info!(
                    "📚 章节 '{}' 抽取到 {} 条事实",
                    chapter_title,
                    facts.len()
                );
                self.generation.caches().facts.set(
                    cache_key,
                    facts.clone(),
                    Some(Duration::from_secs(24 * 3600)),
                );
                facts
            }
            Err(e) => {
                // 兜底：空事实列表, 后续验证降级
                warn!("📚 章节 '{}' 事实抽取失败, 降级为无依据生成: {}", chapter_title, e);
                Vec::new()
            }
        }
    }

    // ========== 语义验证 ==========

    /// 验证单个题目是否有源文依据
    pub async fn validate_question(
        &self,
        question: &Question,
        facts: &[Fact],
        source_text: &str,
    ) -> SemanticValidationResult {
        let qa_text = format!("{} {}", question.prompt, question.correct_option());
        let has_plausible_ref = question
            .source_reference
            .as_deref()
            .map(is_plausible_reference)
            .unwrap_or(false);

        // 第一档：关键词/重叠启发式（零外部调用）
        let (strong_ids, weak_ids) = match_facts(&qa_text, facts);

        if !strong_ids.is_empty() {
            if has_plausible_ref {
                // 强匹配 + 可信引用 → 直接接受, 省一次外部调用
                let confidence = 0.80;
                return SemanticValidationResult {
                    is_valid: confidence >= self.min_confidence,
                    confidence,
                    matched_fact_ids: strong_ids,
                    issues: Vec::new(),
                };
            }
            let confidence = 0.70;
            return SemanticValidationResult {
                is_valid: confidence >= self.min_confidence,
                confidence,
                matched_fact_ids: strong_ids,
                issues: vec!["weak match: 缺少可信的源文引用".to_string()],
            };
        }

        if !weak_ids.is_empty() {
            let confidence = 0.70;
            return SemanticValidationResult {
                is_valid: confidence >= self.min_confidence,
                confidence,
                matched_fact_ids: weak_ids,
                issues: vec!["weak match: 仅有弱关键词重叠".to_string()],
            };
        }

        // 第二档：启发式没有任何匹配, 升级模型裁决
        self.adjudicate(question, source_text, has_plausible_ref)
            .await
    }

    /// 模型裁决：答案是否被源文支撑、干扰项是否明显错误
    async fn adjudicate(
        &self,
        question: &Question,
        source_text: &str,
        has_plausible_ref: bool,
    ) -> SemanticValidationResult {
        let prompt = build_adjudication_prompt(
            question,
            truncate_chars(source_text, self.source_truncate_chars),
        );
        let system = "你是一个严谨的教育内容审核助手。只输出 JSON 对象，不要输出任何其他内容。";

        let result = self
            .generation
            .generate_text_cached(
                "semantic_adjudication",
                &prompt,
                Some(system),
                &RetryPolicy::fast(),
                None,
            )
            .await;

        match result.and_then(|output| parse_verdict(&output.content)) {
            Ok(verdict) => {
                let confidence = verdict.confidence.unwrap_or(0.5).clamp(0.0, 1.0);
                let mut issues = vec!["已升级模型裁决".to_string()];
                if verdict.distractors_wrong == Some(false) {
                    issues.push("裁决认为存在可辩护的干扰项".to_string());
                }
                SemanticValidationResult {
                    is_valid: verdict.supported && confidence >= self.min_confidence,
                    confidence,
                    matched_fact_ids: Vec::new(),
                    issues,
                }
            }
            Err(e) => {
                // 裁决也失败：只有带可信引用的题目值得降级信任
                debug!("语义裁决失败, 走降级信任: {}", e);
                let confidence = if has_plausible_ref {
                    reduced_trust_confidence(question.source_reference.as_deref().unwrap_or(""))
                } else {
                    0.0
                };
                SemanticValidationResult {
                    is_valid: has_plausible_ref && confidence >= self.min_confidence,
                    confidence,
                    matched_fact_ids: Vec::new(),
                    issues: vec!["裁决调用失败, 按源文引用降级信任".to_string()],
                }
            }
        }
    }

    /// 批量语义验证
    ///
    /// 按最低置信度过滤并输出统计。事实列表为空时跳过
    /// （抽取已经兜底失败, 没有依据可查）。
    pub async fn validate_batch(
        &self,
        questions: Vec<Question>,
        facts: &[Fact],
        source_text: &str,
    ) -> (Vec<Question>, SemanticBatchReport) {
        let mut report = SemanticBatchReport {
            total: questions.len(),
            ..Default::default()
        };

        if facts.is_empty() {
            report.passed = questions.len();
            return (questions, report);
        }

        let mut survivors = Vec::with_capacity(questions.len());
        let mut confidence_sum = 0.0;

        for q in questions {
            let result = self.validate_question(&q, facts, source_text).await;
            confidence_sum += result.confidence;
            if result.issues.iter().any(|i| i.contains("裁决")) {
                report.escalations += 1;
            }

            if result.is_valid && result.confidence >= self.min_confidence {
                survivors.push(q);
                report.passed += 1;
            } else {
                debug!(
                    "🔎 题目语义验证未通过 (置信度 {:.2}): {}",
                    result.confidence, q.prompt
                );
                report.failed += 1;
            }
        }

        if report.total > 0 {
            report.mean_confidence = confidence_sum / report.total as f64;
        }
        info!(
            "🔎 语义验证: 通过 {}/{} (升级裁决 {} 次)",
            report.passed, report.total, report.escalations
        );

        (survivors, report)
    }
}

// ========== 纯函数部分（独立可测） ==========

/// 引用长度是否可信
fn is_plausible_reference(reference: &str) -> bool {
    let len = reference.trim().chars().count();
    (PLAUSIBLE_REF_MIN..=PLAUSIBLE_REF_MAX).contains(&len)
}

/// 降级信任置信度：按引用长度在 0.3–0.5 之间线性取值
fn reduced_trust_confidence(reference: &str) -> f64 {
    let len = reference.trim().chars().count().min(PLAUSIBLE_REF_MAX);
    if len < PLAUSIBLE_REF_MIN {
        return 0.3;
    }
    let span = (PLAUSIBLE_REF_MAX - PLAUSIBLE_REF_MIN) as f64;
    0.3 + 0.2 * ((len - PLAUSIBLE_REF_MIN) as f64 / span)
}

/// 题目+答案与事实列表做启发式匹配
///
/// 返回 (强匹配事实 id, 弱匹配事实 id)。强匹配 = ≥2 个共享关键词
/// 或 ≥30% token 重叠；弱匹配 = 1 个共享关键词或 ≥15% 重叠。
fn match_facts(qa_text: &str, facts: &[Fact]) -> (Vec<String>, Vec<String>) {
    let qa_lower = qa_text.to_lowercase();
    let qa_tokens = tokenize(qa_text);

    let mut strong = Vec::new();
    let mut weak = Vec::new();

    for fact in facts {
        let shared_keywords = fact
            .keywords
            .iter()
            .filter(|kw| {
                let kw_lower = kw.trim().to_lowercase();
                !kw_lower.is_empty()
                    && (qa_lower.contains(&kw_lower) || qa_tokens.contains(&kw_lower))
            })
            .count();
        let overlap = overlap_ratio(qa_text, &fact.statement);

        if shared_keywords >= STRONG_KEYWORD_MATCHES || overlap >= STRONG_OVERLAP {
            strong.push(fact.id.clone());
        } else if shared_keywords == 1 || overlap >= WEAK_OVERLAP {
            weak.push(fact.id.clone());
        }
    }

    (strong, weak)
}

/// 解析抽取输出, 丢弃引用不是字面摘录的事实
fn parse_facts(content: &str, source_text: &str) -> Vec<Fact> {
    let json_slice = match extract_json_array(content) {
        Some(s) => s,
        None => {
            warn!("事实抽取输出中找不到 JSON 数组");
            return Vec::new();
        }
    };

    let raw_facts: Vec<RawFact> = match serde_json::from_str(json_slice) {
        Ok(v) => v,
        Err(e) => {
            warn!("事实抽取输出解析失败: {}", e);
            return Vec::new();
        }
    };

    let source_lower = source_text.to_lowercase();
    let mut facts = Vec::new();
    for (idx, raw) in raw_facts.into_iter().enumerate() {
        let statement = match raw.statement {
            Some(s) if !s.trim().is_empty() => s,
            _ => continue,
        };
        let quote = match raw.source_quote {
            Some(q) if !q.trim().is_empty() => q,
            _ => continue,
        };
        // 不变式：引用必须是源文的字面摘录
        if !source_lower.contains(&quote.trim().to_lowercase()) {
            debug!("丢弃引用不在源文中的事实: {}", statement);
            continue;
        }

        facts.push(Fact {
            id: raw.id.unwrap_or_else(|| format!("f{}", idx + 1)),
            statement,
            source_quote: quote,
            category: raw
                .category
                .as_deref()
                .map(FactCategory::parse_lossy)
                .unwrap_or(FactCategory::Definition),
            confidence: raw.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
            keywords: raw
                .keywords
                .into_iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        });
    }
    facts
}

fn parse_verdict(content: &str) -> Result<AdjudicationVerdict> {
    let json_slice = extract_json_object(content)
        .ok_or_else(|| anyhow::anyhow!("裁决输出中找不到 JSON 对象"))?;
    Ok(serde_json::from_str(json_slice)?)
}

/// 容忍 markdown 围栏和前后缀, 取第一个 '[' 到最后一个 ']'
fn extract_json_array(content: &str) -> Option<&str> {
    let start = content.find('[')?;
    let end = content.rfind(']')?;
    (end > start).then(|| &content[start..=end])
}

fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

fn build_extraction_prompt(source_text: &str, chapter_title: &str, lang: Lang) -> String {
    format!(
        r#"从下面的章节文本中抽取原子的、可独立验证的事实。

【要求】
- 每条事实是一个独立成立的陈述，不依赖其他事实
- 每条事实必须附带一段支撑它的字面原文摘录（source_quote 字段，逐字复制，不要改写）
- category 取值：definition / formula / process / relationship / statistic / example
- keywords 给出 3-6 个内容关键词（使用原文语言: {}）
- confidence 为 0 到 1 的小数
- 只输出 JSON 数组，格式：
  [{{"id": "f1", "statement": "...", "source_quote": "...", "category": "definition", "confidence": 0.9, "keywords": ["..."]}}]

章节标题：{}

章节文本：
{}"#,
        lang.code(),
        chapter_title,
        source_text
    )
}

fn build_adjudication_prompt(question: &Question, source_text: &str) -> String {
    format!(
        r#"判断下面这道选择题的答案是否被源文支撑。

【判断标准】
1. 标注的正确答案能否从源文中得到支持（直接陈述或合理转述）
2. 其余三个干扰项是否明显错误（如果某个干扰项也说得通，这道题有问题）

题干：{}
选项：{}
标注的正确答案：{}
解析：{}

源文：
{}

只输出 JSON 对象：
{{"supported": true/false, "confidence": 0.0-1.0, "distractors_clearly_wrong": true/false}}"#,
        question.prompt,
        question.options.join(" | "),
        question.correct_option(),
        question.explanation,
        source_text
    )
}
