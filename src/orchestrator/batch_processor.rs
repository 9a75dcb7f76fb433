//! 批量课程处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量课程文档的处理和资源管理。
//!
//! 1. **应用初始化**：启动日志、构造熔断器/缓存注册表（进程内仅一份）
//! 2. **批量加载**：扫描并加载所有待处理的源文档
//! 3. **向下委托**：委托 course_processor 处理单个文档
//! 4. **结果落盘**：把每份课程的题目和审计报告写成 JSON
//! 5. **全局统计**：汇总所有文档的处理结果
//!
//! 注册表按引用注入下层（依赖注入, 不做隐藏全局量），
//! 测试可以构造隔离实例。

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::infrastructure::{BreakerRegistry, CacheRegistry};
use crate::models::load_course_documents;
use crate::orchestrator::course_processor::{self, CourseReport};
use crate::services::{AuditService, FallbackService, GenerationService, SegmentService};
use crate::utils::logging::{init_log_file, log_startup, print_final_stats};
use crate::workflow::ChapterFlow;

/// 应用主结构
pub struct App {
    config: Config,
    segmenter: SegmentService,
    auditor: AuditService,
    fallback: FallbackService,
    flow: Arc<ChapterFlow>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        init_log_file(&config.output_log_file)?;
        log_startup(config.max_concurrent_chapters);

        // 注册表进程内只构造一份, 所有调用共享同一套熔断计数器和缓存
        let breakers = Arc::new(BreakerRegistry::new(&config));
        let caches = Arc::new(CacheRegistry::new(&config));
        let generation = Arc::new(GenerationService::new(&config, breakers, caches));
        let flow = Arc::new(ChapterFlow::new(&config, generation)?);

        Ok(Self {
            segmenter: SegmentService::new(&config),
            auditor: AuditService::new(),
            fallback: FallbackService::new(),
            flow,
            config,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        let documents = load_course_documents(&self.config.source_folder).await?;

        if documents.is_empty() {
            warn!("⚠️ 没有找到待处理的源文档，程序结束");
            return Ok(());
        }

        let total = documents.len();
        info!("✓ 找到 {} 个待处理的源文档", total);

        let mut success = 0usize;
        let mut failed = 0usize;

        for document in documents {
            let name = document.name.clone();
            match course_processor::process_course(
                self.flow.clone(),
                &self.segmenter,
                &self.auditor,
                &self.fallback,
                &self.config,
                document,
            )
            .await
            {
                Ok(report) => {
                    if let Err(e) = self.write_report(&report) {
                        warn!("课程 '{}' 结果落盘失败: {}", name, e);
                    }
                    success += 1;
                }
                Err(e) => {
                    error!("❌ 课程 '{}' 处理失败: {}", name, e);
                    failed += 1;
                }
            }
        }

        self.log_cache_stats();
        print_final_stats(success, failed, total, &self.config.output_log_file);

        Ok(())
    }

    /// 把课程报告写成 JSON（题目交给外部持久化层, 这里只留审计样本）
    fn write_report(&self, report: &CourseReport) -> Result<()> {
        let out_path = Path::new(&self.config.source_folder)
            .join(format!("{}.questions.json", report.name));

        let payload = json!({
            "course": report.name,
            "total_questions": report.total_questions(),
            "fallback_chapters": report.fallback_chapters(),
            "audit_score": report.audit.score,
            "chapters": report
                .chapters
                .iter()
                .map(|c| {
                    json!({
                        "index": c.boundary.index,
                        "title": &c.boundary.title,
                        "span": [c.boundary.start_position, c.boundary.end_position],
                        "used_fallback": c.used_fallback,
                        "questions": &c.questions,
                    })
                })
                .collect::<Vec<_>>(),
            "audit": &report.audit,
        });

        std::fs::write(&out_path, serde_json::to_string_pretty(&payload)?)?;
        info!("💾 课程报告已写入: {}", out_path.display());
        Ok(())
    }

    /// 输出缓存命中统计（重建成本指标用）
    fn log_cache_stats(&self) {
        let caches = self.flow_caches();
        let cls = caches.classification.stats();
        let facts = caches.facts.stats();
        info!(
            "💾 缓存统计: classification 命中率 {:.0}% ({}/{}), facts 命中率 {:.0}% ({}/{})",
            cls.hit_rate() * 100.0,
            cls.hits,
            cls.hits + cls.misses,
            facts.hit_rate() * 100.0,
            facts.hits,
            facts.hits + facts.misses,
        );
    }

    fn flow_caches(&self) -> &CacheRegistry {
        self.flow.generation().caches()
    }
}
