pub mod admin_filter;
pub mod ambiguity_detector;
pub mod audit_service;
pub mod dedup_tracker;
pub mod fact_service;
pub mod fallback_service;
pub mod generation_service;
pub mod llm_service;
pub mod question_validator;
pub mod segment_service;

pub use admin_filter::{AdminBatchReport, AdminClassification, AdminFilter};
pub use ambiguity_detector::{detect_ambiguity, AmbiguityFinding, AmbiguityRule};
pub use audit_service::AuditService;
pub use dedup_tracker::{DedupTracker, DuplicateCheck, RemovedDuplicate};
pub use fact_service::FactService;
pub use fallback_service::{FallbackService, SubjectArea};
pub use generation_service::{Dependency, GenerationService};
pub use llm_service::{GenerationOutput, GenerationUsage, LlmService, OcrClient};
pub use question_validator::QuestionValidator;
pub use segment_service::{SegmentOptions, SegmentService};
