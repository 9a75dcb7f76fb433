pub mod chapter_flow;
pub mod generation_ctx;

pub use chapter_flow::{ChapterFlow, ChapterOutcome, PipelineStats};
pub use generation_ctx::GenerationCtx;
