pub mod toml_loader;

pub use toml_loader::{load_chapter_metas, load_course_documents, CourseDocument};
