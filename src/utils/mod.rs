pub mod logging;
pub mod text;

pub use text::{fold_accents, is_cjk, is_mostly_numeric, jaccard_similarity, overlap_ratio, tokenize, truncate_chars, truncate_text};
