pub mod audit;
pub mod chapter;
pub mod fact;
pub mod lang;
pub mod loaders;
pub mod question;

pub use audit::{ChapterAudit, CourseAudit, QuestionAudit, NOT_AUDITABLE};
pub use chapter::{BoundaryStrategy, ChapterBoundary, ChapterMeta};
pub use fact::{Fact, FactCategory, SemanticBatchReport, SemanticValidationResult};
pub use lang::Lang;
pub use loaders::{load_chapter_metas, load_course_documents, CourseDocument};
pub use question::{
    BatchValidationReport, CognitiveLevel, Question, RawQuestion, Severity, ValidationIssue,
    ValidationResult,
};
