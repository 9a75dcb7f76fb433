//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ### `batch_processor` - 批量课程处理器
//! - 管理应用生命周期（初始化、运行、结果落盘）
//! - 构造并持有熔断器/缓存注册表（进程内唯一）
//! - 输出全局统计信息
//!
//! ### `course_processor` - 单个课程处理器
//! - 分段：把章节元数据对齐回源文本
//! - 按固定窗口分波并发处理章节（Semaphore + 波屏障）
//! - 事后质量审计（只评分, 永不阻断）
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<CourseDocument>)
//!     ↓
//! course_processor (处理 Vec<ChapterBoundary>)
//!     ↓
//! workflow::ChapterFlow (处理单个章节)
//!     ↓
//! services (能力层：validate / dedup / filter / facts / segment / audit)
//!     ↓
//! infrastructure (基础设施：breaker / retry / cache)
//! ```

pub mod batch_processor;
pub mod course_processor;

// 重新导出主要类型
pub use batch_processor::App;
pub use course_processor::{process_course, ChapterResult, CourseReport};
