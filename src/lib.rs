//! # Question Gen Guard
//!
//! 一个让不可靠的生成式调用产出可信教育内容的 Rust 流水线
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 故障隔离原语，持有保护下游的共享状态
//! - `CircuitBreaker` - 按依赖隔离的熔断器（文本/视觉各一个）
//! - `with_retry` - 指数退避重试（只重试瞬时故障）
//! - `ResponseCache` - TTL + LRU 响应缓存
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，一个结构体一种能力
//! - `QuestionValidator` - 结构验证与自动修复
//! - `AdminFilter` / `detect_ambiguity` - 启发式内容检查
//! - `DedupTracker` - 跨章节去重
//! - `FactService` - 事实抽取与语义验证
//! - `SegmentService` - 章节文本分段
//! - `AuditService` - 事后质量审计
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个章节"的完整处理流程
//! - `GenerationCtx` - 上下文封装（chapter_index + title + lang）
//! - `ChapterFlow` - 流程编排（facts → generate → validate → dedup → filter → semantic → fallback）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量课程处理器，管理注册表和生命周期
//! - `orchestrator/course_processor` - 单个课程处理器，分波并发处理章节
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod keywords;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{BreakerRegistry, CacheRegistry, CircuitBreaker, ResponseCache};
pub use models::{ChapterBoundary, ChapterMeta, Fact, Lang, Question, ValidationResult};
pub use orchestrator::{process_course, App, CourseReport};
pub use workflow::{ChapterFlow, ChapterOutcome, GenerationCtx};
