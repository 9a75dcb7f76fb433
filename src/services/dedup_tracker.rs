//! 跨章节去重追踪器 - 业务能力层
//!
//! 生命周期覆盖一次完整的课程生成会话（不是单次调用）：
//! 一旦某道题被收录追踪，它的文本在会话内永远会被判为重复。
//! 阈值 0.65 比批内检查（0.8）更宽松: 跨章节重复对学习价值的
//! 伤害更大，宁可错杀。

use tracing::{debug, info};

use crate::config::Config;
use crate::models::Question;
use crate::utils::{jaccard_similarity, truncate_text};

/// 已追踪的题目指纹
#[derive(Debug, Clone)]
struct DedupRecord {
    chapter_index: usize,
    normalized_text: String,
}

/// 重复检查结论
#[derive(Debug, Clone)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    /// 与哪个早先章节重复
    pub duplicate_of_chapter: Option<usize>,
    /// 实测相似度
    pub similarity: Option<f64>,
}

/// 单条被移除题目的明细
#[derive(Debug, Clone)]
pub struct RemovedDuplicate {
    /// 原文节选
    pub excerpt: String,
    /// 重复自哪个章节
    pub duplicate_of_chapter: usize,
    /// 实测相似度
    pub similarity: f64,
}

/// 跨章节去重追踪器
///
/// 有状态，按课程生成会话实例化（显式实例，不做全局量）。
pub struct DedupTracker {
    threshold: f64,
    seen: Vec<DedupRecord>,
}

impl DedupTracker {
    /// 创建新的追踪器
    pub fn new(config: &Config) -> Self {
        Self::with_threshold(config.dedup_cross_chapter_threshold)
    }

    /// 指定阈值创建（测试和标定用）
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold,
            seen: Vec::new(),
        }
    }

    /// 检查一段题目文本是否与已追踪的题目重复
    ///
    /// 与每一条已追踪记录算 token-Jaccard，取最高相似度判断。
    pub fn is_duplicate(&self, text: &str) -> DuplicateCheck {
        let normalized = normalize(text);

        let mut best: Option<(usize, f64)> = None;
        for record in &self.seen {
            let sim = jaccard_similarity(&normalized, &record.normalized_text);
            if best.map(|(_, s)| sim > s).unwrap_or(true) {
                best = Some((record.chapter_index, sim));
            }
        }

        match best {
            Some((chapter, sim)) if sim > self.threshold => DuplicateCheck {
                is_duplicate: true,
                duplicate_of_chapter: Some(chapter),
                similarity: Some(sim),
            },
            Some((_, sim)) => DuplicateCheck {
                is_duplicate: false,
                duplicate_of_chapter: None,
                similarity: Some(sim),
            },
            None => DuplicateCheck {
                is_duplicate: false,
                duplicate_of_chapter: None,
                similarity: None,
            },
        }
    }

    /// 过滤一个章节的题目批次
    ///
    /// 存活题目全部加入追踪集；返回过滤后的列表和每条被移除题目的明细。
    pub fn filter_questions(
        &mut self,
        questions: Vec<Question>,
        chapter_index: usize,
    ) -> (Vec<Question>, Vec<RemovedDuplicate>) {
        let total = questions.len();
        let mut survivors = Vec::with_capacity(total);
        let mut removed = Vec::new();

        for q in questions {
            let check = self.is_duplicate(&q.prompt);
            if check.is_duplicate {
                let detail = RemovedDuplicate {
                    excerpt: truncate_text(&q.prompt, 80),
                    duplicate_of_chapter: check.duplicate_of_chapter.unwrap_or(chapter_index),
                    similarity: check.similarity.unwrap_or(1.0),
                };
                debug!(
                    "♻️ 章节 {} 题目与章节 {} 重复 (相似度 {:.2}): {}",
                    chapter_index, detail.duplicate_of_chapter, detail.similarity, detail.excerpt
                );
                removed.push(detail);
            } else {
                self.seen.push(DedupRecord {
                    chapter_index,
                    normalized_text: normalize(&q.prompt),
                });
                survivors.push(q);
            }
        }

        if !removed.is_empty() {
            info!(
                "♻️ 章节 {} 去重: 移除 {}/{} 道跨章节重复题",
                chapter_index,
                removed.len(),
                total
            );
        }

        (survivors, removed)
    }

    /// 当前追踪的题目数
    pub fn tracked_count(&self) -> usize {
        self.seen.len()
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_question(prompt: &str) -> Question {
        Question {
            prompt: prompt.to_string(),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_index: 0,
            explanation: String::new(),
            source_reference: None,
            cognitive_level: None,
            concept_tested: None,
        }
    }

    #[test]
    fn test_first_occurrence_not_duplicate() {
        let tracker = DedupTracker::with_threshold(0.65);
        let check = tracker.is_duplicate("What drives merger waves in concentrated industries?");
        assert!(!check.is_duplicate);
        assert!(check.similarity.is_none());
    }

    #[test]
    fn test_identical_text_always_duplicate() {
        // 单调性：收录后同一文本无论章节都判重复
        let mut tracker = DedupTracker::with_threshold(0.65);
        let prompt = "What drives merger waves in concentrated industries?";
        let (survivors, _) = tracker.filter_questions(vec![make_question(prompt)], 0);
        assert_eq!(survivors.len(), 1);

        for chapter in [0, 3, 7] {
            let check = tracker.is_duplicate(prompt);
            assert!(check.is_duplicate, "章节 {} 应判重复", chapter);
            assert_eq!(check.duplicate_of_chapter, Some(0));
            assert!(check.similarity.unwrap() > 0.99);
        }
    }

    #[test]
    fn test_near_duplicate_across_chapters() {
        let mut tracker = DedupTracker::with_threshold(0.65);
        tracker.filter_questions(
            vec![make_question(
                "Which economic shock triggered the merger wave of the 1990s?",
            )],
            0,
        );

        let (survivors, removed) = tracker.filter_questions(
            vec![make_question(
                "Which economic shock triggered the big merger wave of the 1990s?",
            )],
            2,
        );

        assert!(survivors.is_empty());
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].duplicate_of_chapter, 0);
        assert!(removed[0].similarity > 0.65);
    }

    #[test]
    fn test_distinct_questions_survive() {
        let mut tracker = DedupTracker::with_threshold(0.65);
        tracker.filter_questions(
            vec![make_question("What is the formula for free cash flow?")],
            0,
        );

        let (survivors, removed) = tracker.filter_questions(
            vec![make_question("Which regulation changed bank capital requirements?")],
            1,
        );

        assert_eq!(survivors.len(), 1);
        assert!(removed.is_empty());
        assert_eq!(tracker.tracked_count(), 2);
    }

    #[test]
    fn test_removed_items_not_tracked() {
        // 被移除的重复题不进入追踪集, 不会越滚越大
        let mut tracker = DedupTracker::with_threshold(0.65);
        let prompt = "What drives merger waves in concentrated industries?";
        tracker.filter_questions(vec![make_question(prompt)], 0);
        tracker.filter_questions(vec![make_question(prompt)], 1);
        assert_eq!(tracker.tracked_count(), 1);
    }
}
