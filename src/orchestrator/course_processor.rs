//! 单个课程处理器 - 编排层
//!
//! 负责一份源文档的完整处理：分段 → 按波并发处理章节 → 事后审计。
//!
//! ## 并发模型
//!
//! 章节按固定窗口分波（Semaphore + tokio::spawn），一波内的任务
//! 并发执行，整波屏障同步后才开始下一波, 这限制了对下游生成
//! 服务的峰值压力，不需要完整的工作窃取调度器。

use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::config::Config;
use crate::models::{ChapterBoundary, CourseAudit, CourseDocument, Lang, Question};
use crate::services::{AuditService, DedupTracker, FallbackService, SegmentService};
use crate::utils::logging::{log_wave_complete, log_wave_start};
use crate::workflow::{ChapterFlow, ChapterOutcome, GenerationCtx};

/// 每 6000 字符估一个章节（没有章节元数据时的兜底划分）
const CHARS_PER_FALLBACK_CHAPTER: usize = 6000;
/// 兜底划分的章节数上限
const MAX_FALLBACK_CHAPTERS: usize = 12;

/// 单个章节的处理产出
#[derive(Debug)]
pub struct ChapterResult {
    /// 章节跨度
    pub boundary: ChapterBoundary,
    /// 最终接受的题目
    pub questions: Vec<Question>,
    /// 是否走了兜底内容
    pub used_fallback: bool,
}

/// 一份课程文档的完整处理报告
#[derive(Debug)]
pub struct CourseReport {
    /// 文档名
    pub name: String,
    /// 各章节产出
    pub chapters: Vec<ChapterResult>,
    /// 事后质量审计
    pub audit: CourseAudit,
}

impl CourseReport {
    /// 接受的题目总数
    pub fn total_questions(&self) -> usize {
        self.chapters.iter().map(|c| c.questions.len()).sum()
    }

    /// 走兜底内容的章节数
    pub fn fallback_chapters(&self) -> usize {
        self.chapters.iter().filter(|c| c.used_fallback).count()
    }
}

/// 处理一份课程文档
///
/// # 参数
/// - `flow`: 章节处理流程（共享）
/// - `segmenter` / `auditor` / `fallback`: 业务能力
/// - `config`: 配置
/// - `document`: 待处理的源文档
pub async fn process_course(
    flow: Arc<ChapterFlow>,
    segmenter: &SegmentService,
    auditor: &AuditService,
    fallback: &FallbackService,
    config: &Config,
    document: CourseDocument,
) -> Result<CourseReport> {
    info!(
        "📖 开始处理课程文档: {} ({} 字符)",
        document.name,
        document.text.chars().count()
    );

    // 章节元数据：上游给的优先, 否则按篇幅等分兜底
    let metas = match document.chapters {
        Some(metas) if !metas.is_empty() => metas,
        _ => {
            let estimated = (document.text.chars().count() / CHARS_PER_FALLBACK_CHAPTER)
                .clamp(1, MAX_FALLBACK_CHAPTERS);
            info!("📖 没有章节元数据, 按篇幅等分为 {} 个部分", estimated);
            fallback.build_chapter_metas(&document.text, estimated)
        }
    };

    // 分段：把抽象章节对齐回源文本
    let boundaries = segmenter.extract_chapter_text(&document.text, &metas)?;

    // 去重追踪器以课程生成会话为生命周期
    let dedup = Arc::new(Mutex::new(DedupTracker::new(config)));

    // 按波并发处理章节
    let outcomes = process_in_waves(flow, &boundaries, dedup, config).await;

    // 组装结果 + 事后审计（审计永不阻断, 只评分和建议）
    let mut chapters = Vec::with_capacity(boundaries.len());
    let mut chapter_audits = Vec::with_capacity(boundaries.len());

    for (boundary, outcome) in boundaries.into_iter().zip(outcomes.into_iter()) {
        match outcome {
            Some(outcome) => {
                chapter_audits.push(auditor.audit_chapter(
                    boundary.index,
                    &boundary.title,
                    &outcome.questions,
                    &boundary.text,
                ));
                chapters.push(ChapterResult {
                    questions: outcome.questions,
                    used_fallback: outcome.used_fallback,
                    boundary,
                });
            }
            None => {
                // 任务崩溃的章节也要有兜底内容
                let questions =
                    fallback.build_chapter_questions(&boundary, config.questions_per_chapter);
                chapter_audits.push(auditor.audit_chapter(
                    boundary.index,
                    &boundary.title,
                    &questions,
                    &boundary.text,
                ));
                chapters.push(ChapterResult {
                    questions,
                    used_fallback: true,
                    boundary,
                });
            }
        }
    }

    let audit = auditor.audit_course(chapter_audits);

    info!(
        "📖 课程 '{}' 处理完成: {} 个章节, {} 道题, 审计得分 {:.1}",
        document.name,
        chapters.len(),
        chapters.iter().map(|c| c.questions.len()).sum::<usize>(),
        audit.score
    );

    Ok(CourseReport {
        name: document.name,
        chapters,
        audit,
    })
}

/// 按固定窗口分波并发处理所有章节
///
/// 返回与输入同序的结果列表, 崩溃的任务为 None。
async fn process_in_waves(
    flow: Arc<ChapterFlow>,
    boundaries: &[ChapterBoundary],
    dedup: Arc<Mutex<DedupTracker>>,
    config: &Config,
) -> Vec<Option<ChapterOutcome>> {
    let total = boundaries.len();
    let wave_size = config.max_concurrent_chapters.max(1);
    let semaphore = Arc::new(Semaphore::new(wave_size));
    let total_waves = total.div_ceil(wave_size);

    let mut outcomes: Vec<Option<ChapterOutcome>> = Vec::with_capacity(total);

    for wave_start in (0..total).step_by(wave_size) {
        let wave_end = (wave_start + wave_size).min(total);
        let wave_num = wave_start / wave_size + 1;
        log_wave_start(wave_num, total_waves, wave_start + 1, wave_end, total);

        // 为本波创建并发任务
        let mut handles = Vec::with_capacity(wave_end - wave_start);
        for boundary in &boundaries[wave_start..wave_end] {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("信号量已关闭");
            let flow = flow.clone();
            let dedup = dedup.clone();
            let boundary = boundary.clone();
            let chapter_index = boundary.index;
            let ctx = GenerationCtx::new(
                chapter_index,
                boundary.title.clone(),
                Lang::detect(&boundary.text),
            );

            let handle = tokio::spawn(async move {
                let _permit = permit;
                flow.run(&boundary, &dedup, &ctx).await
            });
            handles.push((chapter_index, handle));
        }

        // 屏障：整波全部完成后才开始下一波
        let wave_results = futures::future::join_all(
            handles
                .into_iter()
                .map(|(idx, handle)| async move { (idx, handle.await) }),
        )
        .await;

        let mut wave_success = 0usize;
        for (idx, joined) in wave_results {
            match joined {
                Ok(Ok(outcome)) => {
                    wave_success += 1;
                    outcomes.push(Some(outcome));
                }
                Ok(Err(e)) => {
                    error!("[章节 {}] ❌ 处理过程中发生错误: {}", idx, e);
                    outcomes.push(None);
                }
                Err(e) => {
                    error!("[章节 {}] ❌ 任务执行失败: {}", idx, e);
                    outcomes.push(None);
                }
            }
        }

        log_wave_complete(wave_num, wave_success, wave_end - wave_start);
    }

    outcomes
}
