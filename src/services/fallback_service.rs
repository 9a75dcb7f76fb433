//! 兜底内容服务 - 业务能力层
//!
//! 生成链路彻底失败（熔断打开、批次全部被过滤）时，从源文本
//! 确定性地构造模板化的章节和题目，保证最终用户永远不会拿到
//! 空结果。没有任何外部调用：关键词统计 + 轻量学科分类器 + 模板。

use std::collections::HashMap;

use tracing::info;

use crate::keywords;
use crate::models::{ChapterBoundary, ChapterMeta, CognitiveLevel, Lang, Question};

/// 学科大类
///
/// 只用于给兜底干扰项挑一组像样的词，分类错了也不影响正确性。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectArea {
    /// 数理
    Math,
    /// 自然科学
    Science,
    /// 经济金融
    Economics,
    /// 历史社会
    History,
    /// 语言人文
    Language,
    /// 信息技术
    Technology,
    /// 无法判断
    General,
}

impl SubjectArea {
    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            SubjectArea::Math => "数理",
            SubjectArea::Science => "自然科学",
            SubjectArea::Economics => "经济金融",
            SubjectArea::History => "历史社会",
            SubjectArea::Language => "语言人文",
            SubjectArea::Technology => "信息技术",
            SubjectArea::General => "通用",
        }
    }

    /// 在源文本上运行轻量分类（关键词计票, 多者胜出）
    pub fn find(text: &str) -> Self {
        let lower = text.to_lowercase();
        let tables: [(SubjectArea, &[&str]); 6] = [
            (
                SubjectArea::Math,
                &["equation", "theorem", "integral", "matrix", "ecuación", "teorema", "方程", "定理", "矩阵"],
            ),
            (
                SubjectArea::Science,
                &["molecule", "cell", "energy", "reaction", "molécula", "célula", "分子", "细胞", "能量", "反应"],
            ),
            (
                SubjectArea::Economics,
                &["market", "capital", "price", "investment", "cash flow", "mercado", "inversión", "市场", "资本", "投资", "现金流"],
            ),
            (
                SubjectArea::History,
                &["century", "empire", "revolution", "war", "siglo", "imperio", "世纪", "王朝", "革命", "战争"],
            ),
            (
                SubjectArea::Language,
                &["grammar", "verb", "sentence", "literature", "gramática", "verbo", "语法", "动词", "文学"],
            ),
            (
                SubjectArea::Technology,
                &["algorithm", "software", "network", "database", "algoritmo", "红黑树", "算法", "软件", "网络", "数据库"],
            ),
        ];

        let mut best = (SubjectArea::General, 0usize);
        for (area, words) in tables {
            let score = words.iter().filter(|w| lower.contains(*w)).count();
            if score > best.1 {
                best = (area, score);
            }
        }
        best.0
    }
}

/// 兜底内容服务
#[derive(Default)]
pub struct FallbackService;

impl FallbackService {
    /// 创建新的兜底服务
    pub fn new() -> Self {
        Self
    }

    /// 为一个章节确定性地构造模板题目
    ///
    /// 相同输入永远产出相同题目（没有随机性，方便排查线上兜底内容）。
    pub fn build_chapter_questions(
        &self,
        boundary: &ChapterBoundary,
        count: usize,
    ) -> Vec<Question> {
        let lang = Lang::detect(&boundary.text);
        let subject = SubjectArea::find(&boundary.text);
        let top_keywords = extract_keywords(&boundary.text, lang, count + 6);

        if top_keywords.is_empty() {
            return Vec::new();
        }

        info!(
            "🧩 章节 {} 走兜底内容: 学科 {}, {} 个关键词可用",
            boundary.index,
            subject.name(),
            top_keywords.len()
        );

        let mut questions = Vec::new();
        for i in 0..count.min(top_keywords.len()) {
            let concept = &top_keywords[i];
            // 干扰项优先用本章的低频关键词, 不够时用学科通用词补
            let mut distractors: Vec<String> = top_keywords
                .iter()
                .skip(count)
                .filter(|k| *k != concept)
                .take(3)
                .cloned()
                .collect();
            let mut filler = subject_filler(subject).iter();
            while distractors.len() < 3 {
                match filler.next() {
                    Some(f) if *f != concept.as_str() => distractors.push(f.to_string()),
                    Some(_) => continue,
                    None => break,
                }
            }
            if distractors.len() < 3 {
                break;
            }

            // 正确选项位置确定性轮转
            let correct_index = i % 4;
            let mut options = distractors;
            options.insert(correct_index.min(options.len()), concept.clone());

            questions.push(Question {
                prompt: prompt_template(lang, &boundary.title),
                options,
                correct_index,
                explanation: explanation_template(lang, concept),
                source_reference: find_reference_sentence(&boundary.text, concept),
                cognitive_level: Some(CognitiveLevel::Remember),
                concept_tested: Some(concept.clone()),
            });
        }
        questions
    }

    /// 没有任何章节元数据可用时, 构造模板化章节划分
    pub fn build_chapter_metas(&self, source_text: &str, count: usize) -> Vec<ChapterMeta> {
        let lang = Lang::detect(source_text);
        (1..=count.max(1))
            .map(|i| {
                ChapterMeta::new(match lang {
                    Lang::Chinese => format!("第 {} 部分", i),
                    Lang::Spanish => format!("Parte {}", i),
                    Lang::English => format!("Part {}", i),
                })
            })
            .collect()
    }
}

/// 统计内容关键词, 频次降序
fn extract_keywords(text: &str, lang: Lang, limit: usize) -> Vec<String> {
    let stop = keywords::stopwords(lang);
    let mut freq: HashMap<String, usize> = HashMap::new();

    for token in text.to_lowercase().split_whitespace() {
        let cleaned = token.trim_matches(|c: char| !c.is_alphanumeric());
        if cleaned.chars().count() <= 3 || stop.contains(cleaned) || cleaned.parse::<f64>().is_ok() {
            continue;
        }
        *freq.entry(cleaned.to_string()).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = freq.into_iter().collect();
    // 频次相同按字典序, 保证确定性
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(w, _)| w).collect()
}

/// 找一句包含关键词的源文句子作为引用
fn find_reference_sentence(text: &str, keyword: &str) -> Option<String> {
    let keyword_lower = keyword.to_lowercase();
    text.split(|c| matches!(c, '.' | '!' | '?' | '。' | '！' | '？'))
        .map(|s| s.trim())
        .find(|s| s.to_lowercase().contains(&keyword_lower))
        .map(|s| {
            let sentence: String = s.chars().take(280).collect();
            sentence
        })
        .filter(|s| s.chars().count() >= 15)
}

fn prompt_template(lang: Lang, title: &str) -> String {
    match lang {
        Lang::Chinese => format!("下列哪一项是\"{}\"部分讨论的核心概念？", title),
        Lang::Spanish => format!(
            "¿Cuál de los siguientes es un concepto principal de la sección \"{}\"?",
            title
        ),
        Lang::English => format!(
            "Which of the following is a central concept of the section \"{}\"?",
            title
        ),
    }
}

fn explanation_template(lang: Lang, concept: &str) -> String {
    match lang {
        Lang::Chinese => format!("源文多次围绕\"{}\"展开论述，其余选项不是本部分的重点。", concept),
        Lang::Spanish => format!(
            "El texto fuente trata repetidamente sobre \"{}\"; las demás opciones no son el foco de esta sección.",
            concept
        ),
        Lang::English => format!(
            "The source text repeatedly discusses \"{}\"; the other options are not the focus of this section.",
            concept
        ),
    }
}

/// 学科通用干扰词（仅兜底用）
fn subject_filler(subject: SubjectArea) -> &'static [&'static str] {
    match subject {
        SubjectArea::Math => &["derivative", "polynomial", "vector", "probability"],
        SubjectArea::Science => &["osmosis", "catalyst", "photon", "enzyme"],
        SubjectArea::Economics => &["liquidity", "arbitrage", "inflation", "dividend"],
        SubjectArea::History => &["dynasty", "treaty", "reform", "migration"],
        SubjectArea::Language => &["metaphor", "syntax", "narrative", "phoneme"],
        SubjectArea::Technology => &["compiler", "protocol", "encryption", "cache"],
        SubjectArea::General => &["overview", "context", "structure", "background"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundaryStrategy;

    fn finance_boundary() -> ChapterBoundary {
        let text = "Capital markets allocate investment across firms. The cash flow of a \
                    project determines its value. Investors price capital according to risk. \
                    Capital budgeting compares investment alternatives using discounted cash flow."
            .to_string();
        ChapterBoundary {
            index: 0,
            title: "Capital Budgeting".to_string(),
            start_position: 0,
            end_position: text.len(),
            text,
            strategy: BoundaryStrategy::ExactTitle,
        }
    }

    #[test]
    fn test_subject_classifier() {
        assert_eq!(
            SubjectArea::find("The market prices capital and investment flows."),
            SubjectArea::Economics
        );
        assert_eq!(
            SubjectArea::find("细胞通过分子层面的反应转换能量。"),
            SubjectArea::Science
        );
        assert_eq!(SubjectArea::find("nothing recognizable here"), SubjectArea::General);
    }

    #[test]
    fn test_fallback_questions_are_structurally_valid() {
        let questions = FallbackService::new().build_chapter_questions(&finance_boundary(), 3);
        assert!(!questions.is_empty());
        for q in &questions {
            assert_eq!(q.options.len(), 4, "选项: {:?}", q.options);
            assert!(q.correct_index < 4);
            // 正确选项就是被考查的概念
            assert_eq!(
                Some(&q.options[q.correct_index]),
                q.concept_tested.as_ref()
            );
        }
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let svc = FallbackService::new();
        let a = svc.build_chapter_questions(&finance_boundary(), 3);
        let b = svc.build_chapter_questions(&finance_boundary(), 3);
        let prompts_a: Vec<&String> = a.iter().map(|q| &q.prompt).collect();
        let prompts_b: Vec<&String> = b.iter().map(|q| &q.prompt).collect();
        assert_eq!(prompts_a, prompts_b);
        assert_eq!(
            a.iter().map(|q| q.correct_index).collect::<Vec<_>>(),
            b.iter().map(|q| q.correct_index).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_fallback_chapter_metas_language() {
        let svc = FallbackService::new();
        let metas = svc.build_chapter_metas("企业的资本结构决定风险分配。", 3);
        assert_eq!(metas.len(), 3);
        assert!(metas[0].title.contains("部分"));

        let metas_en = svc.build_chapter_metas("The firm allocates capital to projects.", 2);
        assert!(metas_en[0].title.starts_with("Part"));
    }

    #[test]
    fn test_keyword_extraction_deterministic_order() {
        let kws = extract_keywords(
            "capital capital markets markets markets investment",
            Lang::English,
            3,
        );
        assert_eq!(kws, vec!["markets".to_string(), "capital".to_string(), "investment".to_string()]);
    }
}
