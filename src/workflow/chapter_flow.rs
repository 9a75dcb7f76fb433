//! 章节处理流程 - 流程层
//!
//! 核心职责：定义"一个章节"的完整处理流程
//!
//! 流程顺序：
//! 1. 抽取事实（失败则降级为无依据）
//! 2. 生成题目 → 结构验证/修复
//! 3. 跨章节去重 → 行政内容过滤 → 语义验证
//! 4. 兜底内容（章节题目被过滤到空时）
//!
//! 本层不持有任何共享资源（注册表由编排层注入），只依赖业务能力。

use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::{
    BatchValidationReport, ChapterBoundary, Question, RawQuestion, SemanticBatchReport,
};
use crate::services::{
    AdminFilter, DedupTracker, FactService, FallbackService, GenerationService, QuestionValidator,
};
use crate::infrastructure::RetryPolicy;
use crate::utils::{truncate_chars, truncate_text};
use crate::workflow::generation_ctx::GenerationCtx;

/// 章节处理的各环节统计
#[derive(Debug, Default, Clone)]
pub struct PipelineStats {
    /// 抽取到的事实数
    pub fact_count: usize,
    /// 结构验证统计
    pub validation: BatchValidationReport,
    /// 跨章节去重移除数
    pub dedup_removed: usize,
    /// 行政内容移除数
    pub admin_removed: usize,
    /// 语义验证统计
    pub semantic: SemanticBatchReport,
}

/// 章节处理结果
#[derive(Debug)]
pub struct ChapterOutcome {
    /// 最终接受的题目
    pub questions: Vec<Question>,
    /// 是否走了兜底内容
    pub used_fallback: bool,
    /// 各环节统计
    pub stats: PipelineStats,
}

/// 章节处理流程
///
/// - 编排一个章节从生成到过滤的全过程
/// - 决定何时降级、何时兜底
/// - 去重追踪器跨章节共享, 由编排层传入
pub struct ChapterFlow {
    generation: Arc<GenerationService>,
    validator: QuestionValidator,
    admin_filter: AdminFilter,
    fact_service: FactService,
    fallback: FallbackService,
    questions_per_chapter: usize,
    source_truncate_chars: usize,
    verbose_logging: bool,
}

impl ChapterFlow {
    /// 创建新的章节处理流程
    pub fn new(config: &Config, generation: Arc<GenerationService>) -> Result<Self> {
        Ok(Self {
            validator: QuestionValidator::new(config),
            admin_filter: AdminFilter::new()?,
            fact_service: FactService::new(config, generation.clone()),
            fallback: FallbackService::new(),
            questions_per_chapter: config.questions_per_chapter,
            source_truncate_chars: config.source_truncate_chars,
            verbose_logging: config.verbose_logging,
            generation,
        })
    }

    /// 可靠生成服务（供编排层查询缓存/熔断统计）
    pub fn generation(&self) -> &GenerationService {
        &self.generation
    }

    /// 处理一个章节
    pub async fn run(
        &self,
        boundary: &ChapterBoundary,
        dedup: &Mutex<DedupTracker>,
        ctx: &GenerationCtx,
    ) -> Result<ChapterOutcome> {
        let mut stats = PipelineStats::default();

        info!(
            "[章节 {}] 开始处理: {} ({} 字符)",
            ctx.chapter_index,
            truncate_text(&ctx.chapter_title, 40),
            boundary.text.chars().count()
        );

        // ========== 流程 1: 抽取事实 ==========
        let facts = self
            .fact_service
            .extract_facts(&boundary.text, &ctx.chapter_title, ctx.lang)
            .await;
        stats.fact_count = facts.len();

        // ========== 流程 2: 生成 + 结构验证 ==========
        let raws = match self.generate_raw_questions(boundary, ctx).await {
            Ok(raws) if !raws.is_empty() => raws,
            Ok(_) => {
                warn!("[章节 {}] 生成结果为空, 走兜底内容", ctx.chapter_index);
                return Ok(self.fallback_outcome(boundary, stats));
            }
            Err(e) => {
                warn!(
                    "[章节 {}] 生成调用失败 ({}), 走兜底内容",
                    ctx.chapter_index, e
                );
                return Ok(self.fallback_outcome(boundary, stats));
            }
        };

        let (validated, validation_report) = self.validator.validate_batch(&raws, &boundary.text);
        info!(
            "[章节 {}] ✓ 结构验证: 原样 {} / 修复 {} / 拒绝 {} / 批内去重 {}",
            ctx.chapter_index,
            validation_report.valid,
            validation_report.fixed,
            validation_report.rejected,
            validation_report.duplicates_removed
        );
        stats.validation = validation_report;

        // ========== 流程 3: 去重 → 行政过滤 → 语义验证 ==========
        let (survivors, removed) = {
            let mut tracker = dedup.lock().expect("去重追踪器锁中毒");
            tracker.filter_questions(validated, ctx.chapter_index)
        };
        if self.verbose_logging {
            for detail in &removed {
                info!(
                    "[章节 {}]   重复题 (与章节 {}, 相似度 {:.2}): {}",
                    ctx.chapter_index,
                    detail.duplicate_of_chapter,
                    detail.similarity,
                    detail.excerpt
                );
            }
        }
        stats.dedup_removed = removed.len();

        let (survivors, admin_report) = self.admin_filter.filter_batch(survivors);
        stats.admin_removed = admin_report.removed;

        let (survivors, semantic_report) = self
            .fact_service
            .validate_batch(survivors, &facts, &boundary.text)
            .await;
        stats.semantic = semantic_report;

        // ========== 流程 4: 兜底 ==========
        if survivors.is_empty() {
            warn!(
                "[章节 {}] ⚠️ 全部题目被过滤, 走兜底内容",
                ctx.chapter_index
            );
            return Ok(self.fallback_outcome(boundary, stats));
        }

        info!(
            "[章节 {}] ✓ 处理完成, 接受 {} 道题",
            ctx.chapter_index,
            survivors.len()
        );

        Ok(ChapterOutcome {
            questions: survivors,
            used_fallback: false,
            stats,
        })
    }

    /// 调用生成服务产出松散题目列表
    async fn generate_raw_questions(
        &self,
        boundary: &ChapterBoundary,
        ctx: &GenerationCtx,
    ) -> Result<Vec<RawQuestion>> {
        let prompt = build_generation_prompt(
            truncate_chars(&boundary.text, self.source_truncate_chars),
            &ctx.chapter_title,
            ctx.lang.code(),
            self.questions_per_chapter,
        );
        let system = "你是一个专业的教育内容出题助手。只输出 JSON 数组，不要输出任何其他内容。";

        let output = self
            .generation
            .generate_text("generate_questions", &prompt, Some(system), &RetryPolicy::critical())
            .await?;

        parse_raw_questions(&output.content)
    }

    fn fallback_outcome(&self, boundary: &ChapterBoundary, stats: PipelineStats) -> ChapterOutcome {
        let questions = self
            .fallback
            .build_chapter_questions(boundary, self.questions_per_chapter);
        ChapterOutcome {
            questions,
            used_fallback: true,
            stats,
        }
    }
}

/// 解析生成输出中的题目数组
///
/// 容忍 markdown 围栏和前后缀文本；单条解析失败只丢弃那一条。
fn parse_raw_questions(content: &str) -> Result<Vec<RawQuestion>> {
    let start = content
        .find('[')
        .ok_or_else(|| anyhow::anyhow!("生成输出中找不到 JSON 数组"))?;
    let end = content
        .rfind(']')
        .filter(|e| *e > start)
        .ok_or_else(|| anyhow::anyhow!("生成输出中 JSON 数组未闭合"))?;

    let items: Vec<JsonValue> = serde_json::from_str(&content[start..=end])?;
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<RawQuestion>(item).ok())
        .collect())
}

fn build_generation_prompt(
    source_text: &str,
    chapter_title: &str,
    lang_code: &str,
    count: usize,
) -> String {
    format!(
        r#"根据下面的章节文本出 {count} 道四选一的选择题。

【要求】
- 题目使用原文语言（{lang}）
- 每道题恰好 4 个选项, 有且只有一个正确答案
- 只考查学科内容, 不要出关于课程安排/考试形式的题
- 每道题附带 explanation（解析）和 source_reference 字段,
  source_reference 必须是支撑正确答案的字面原文摘录（15-300 字符）
- cognitive_level 取值: remember / understand / apply
- 只输出 JSON 数组, 格式:
  [{{"question": "...", "options": ["...", "...", "...", "..."], "correct_index": 0,
     "explanation": "...", "source_reference": "...", "cognitive_level": "understand",
     "concept_tested": "..."}}]

章节标题：{title}

章节文本：
{source}"#,
        count = count,
        lang = lang_code,
        title = chapter_title,
        source = source_text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_raw_questions_with_fences() {
        let content = r#"好的，以下是题目：
```json
[
  {"question": "What triggers merger waves?", "options": ["Shocks", "Whims", "Cycles", "Weather"], "correct_index": 0},
  {"question": "Broken entry", "options": "not-an-array", "correct_index": "x"}
]
```"#;
        let raws = parse_raw_questions(content).expect("应能解析");
        // 第二条类型不符被丢弃
        assert_eq!(raws.len(), 1);
        assert_eq!(raws[0].question.as_deref(), Some("What triggers merger waves?"));
    }

    #[test]
    fn test_parse_raw_questions_no_array() {
        assert!(parse_raw_questions("抱歉，我做不到。").is_err());
    }

    #[test]
    fn test_generation_prompt_embeds_contract() {
        let prompt = build_generation_prompt("source body", "第一章", "zh", 5);
        assert!(prompt.contains("5 道"));
        assert!(prompt.contains("source_reference"));
        assert!(prompt.contains("第一章"));
    }
}
