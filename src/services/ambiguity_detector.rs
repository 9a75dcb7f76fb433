//! 歧义检测器 - 业务能力层
//!
//! 扫描可能存在多个可辩护正确答案的题目。纯函数，每条规则独立判断、
//! 独立可测，关键词表按语言外置在 [`crate::keywords`]。
//!
//! 两个整体跳过条件：
//! - 源文本缺失或短于 100 字符（没有对照依据，宁可不报）
//! - 选项以数字为主的计算题（构造上不歧义）, 但"背答案"规则例外，
//!   它恰恰要抓命名计算量配一排数字字面量的题

use crate::keywords;
use crate::models::Lang;
use crate::utils::{is_mostly_numeric, tokenize};

/// 源文本最短长度，低于此值整体跳过
const MIN_SOURCE_CHARS: usize = 100;

/// 歧义规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbiguityRule {
    /// 宽泛疑问词开头且无限定词
    VagueInterrogative,
    /// 同类抽象名词选项堆叠
    CategoricalPileup,
    /// 包含性连词
    InclusiveConjunction,
    /// 背答案型计算结果题
    MemorizedCalculation,
    /// 同义词聚类
    SynonymCluster,
    /// 泄露答案的公式前缀
    RevealingFormulaPrefix,
}

/// 单条歧义发现
#[derive(Debug, Clone)]
pub struct AmbiguityFinding {
    pub rule: AmbiguityRule,
    pub message: String,
}

/// 扫描一道题的歧义信号
///
/// # 参数
/// - `prompt`: 题干
/// - `options`: 选项列表
/// - `correct_index`: 正确选项下标（可选，部分规则不需要）
/// - `source_text`: 章节源文本
pub fn detect_ambiguity(
    prompt: &str,
    options: &[String],
    _correct_index: Option<usize>,
    source_text: &str,
) -> Vec<AmbiguityFinding> {
    if source_text.trim().chars().count() < MIN_SOURCE_CHARS {
        return Vec::new();
    }

    let lang = Lang::detect(&format!("{} {}", prompt, options.join(" ")));
    let mut findings = Vec::new();

    // "背答案"规则先跑：它针对的正是数字选项
    if let Some(f) = check_memorized_calculation(prompt, options, lang) {
        findings.push(f);
    }

    // 计算题整体跳过其余规则
    let numeric_options = options.iter().filter(|o| is_mostly_numeric(o)).count();
    if numeric_options * 2 > options.len() {
        return findings;
    }

    if let Some(f) = check_vague_interrogative(prompt, options, source_text, lang) {
        findings.push(f);
    }
    if let Some(f) = check_categorical_pileup(prompt, options, lang) {
        findings.push(f);
    }
    if let Some(f) = check_inclusive_conjunction(prompt, lang) {
        findings.push(f);
    }
    if let Some(f) = check_synonym_cluster(options, lang) {
        findings.push(f);
    }
    if let Some(f) = check_revealing_formula_prefix(prompt, options, lang) {
        findings.push(f);
    }

    findings
}

/// 题干是否带限定词（primary / best / only / ...）
fn has_qualifier(prompt_lower: &str, lang: Lang) -> bool {
    keywords::contains_any(prompt_lower, keywords::qualifiers(lang)).is_some()
}

/// 规则 1：宽泛疑问词开头且无限定词
///
/// 只有当超过 2 个选项各自都能在源文（或题干）的关键词集中找到支撑时
/// 才升级为发现, 那说明确实存在多个说得通的答案。
fn check_vague_interrogative(
    prompt: &str,
    options: &[String],
    source_text: &str,
    lang: Lang,
) -> Option<AmbiguityFinding> {
    let prompt_lower = prompt.to_lowercase();
    let vague = keywords::vague_interrogatives(lang);

    let opens_vague = match lang {
        Lang::Chinese => vague.iter().any(|kw| prompt_lower.contains(kw)),
        _ => prompt_lower
            .split_whitespace()
            .next()
            .map(|first| {
                let clean = first.trim_matches(|c: char| !c.is_alphanumeric() && !c.is_alphabetic());
                vague.contains(clean)
            })
            .unwrap_or(false),
    };

    if !opens_vague || has_qualifier(&prompt_lower, lang) {
        return None;
    }

    let mut reference = tokenize(source_text);
    reference.extend(tokenize(prompt));

    // 只数内容词的支撑，停用词撑不起一个"说得通的答案"
    let stop = keywords::stopwords(lang);
    let supported = options
        .iter()
        .filter(|opt| {
            tokenize(opt)
                .iter()
                .any(|t| !stop.contains(t.as_str()) && reference.contains(t))
        })
        .count();

    if supported > 2 {
        Some(AmbiguityFinding {
            rule: AmbiguityRule::VagueInterrogative,
            message: format!(
                "题干以宽泛疑问词开头且无限定词, {} 个选项都能在源文中找到支撑",
                supported
            ),
        })
    } else {
        None
    }
}

/// 规则 2：≥3 个选项是同一抽象类别的实例且题干无限定词
fn check_categorical_pileup(
    prompt: &str,
    options: &[String],
    lang: Lang,
) -> Option<AmbiguityFinding> {
    let prompt_lower = prompt.to_lowercase();
    if has_qualifier(&prompt_lower, lang) {
        return None;
    }

    for noun in keywords::category_nouns(lang).iter() {
        let count = options
            .iter()
            .filter(|opt| opt.to_lowercase().contains(noun))
            .count();
        if count >= 3 {
            return Some(AmbiguityFinding {
                rule: AmbiguityRule::CategoricalPileup,
                message: format!("{} 个选项都是 '{}' 类别的实例且题干无限定词", count, noun),
            });
        }
    }
    None
}

/// 规则 3：题干含包含性连词（排除公认的二元习语）
fn check_inclusive_conjunction(prompt: &str, lang: Lang) -> Option<AmbiguityFinding> {
    let mut prompt_lower = format!(" {} ", prompt.to_lowercase());
    for idiom in keywords::binary_idioms(lang) {
        prompt_lower = prompt_lower.replace(idiom, " ");
    }

    for conj in keywords::inclusive_conjunctions(lang) {
        if prompt_lower.contains(conj) {
            return Some(AmbiguityFinding {
                rule: AmbiguityRule::InclusiveConjunction,
                message: format!("题干包含连词 '{}', 可能同时问了多件事", conj.trim()),
            });
        }
    }
    None
}

/// 规则 4：题干提到命名计算量且 ≥3 个选项是数字/货币字面量
///
/// 这类题考"背住算出来的数"，教学价值空洞。
fn check_memorized_calculation(
    prompt: &str,
    options: &[String],
    lang: Lang,
) -> Option<AmbiguityFinding> {
    let prompt_lower = prompt.to_lowercase();
    let term = keywords::contains_any(&prompt_lower, keywords::calculation_terms(lang))?;

    let numeric = options.iter().filter(|o| is_mostly_numeric(o)).count();
    if numeric >= 3 {
        Some(AmbiguityFinding {
            rule: AmbiguityRule::MemorizedCalculation,
            message: format!(
                "题干提到计算量 '{}' 而 {} 个选项是数字字面量, 这是背答案题",
                term, numeric
            ),
        })
    } else {
        None
    }
}

/// 规则 5：≥2 个选项落在同一个预定义同义词组
fn check_synonym_cluster(options: &[String], lang: Lang) -> Option<AmbiguityFinding> {
    for group in keywords::synonym_groups(lang) {
        let mut hits: Vec<&str> = Vec::new();
        for opt in options {
            let opt_lower = opt.to_lowercase();
            if group.iter().any(|syn| opt_lower.contains(syn)) {
                hits.push(opt);
            }
        }
        if hits.len() >= 2 {
            return Some(AmbiguityFinding {
                rule: AmbiguityRule::SynonymCluster,
                message: format!(
                    "选项 '{}' 与 '{}' 属于同一同义词组, 考生无法区分",
                    hits[0], hits[1]
                ),
            });
        }
    }
    None
}

/// 规则 6：题干索要某命名量的公式/定义, 而某个选项以 "<该名> = ..." 开头
///
/// 选项格式本身就把答案泄露了。只有当至少 2 个其他选项没有同样的
/// 等式前缀时才报（全部选项统一格式时不算泄露）。
fn check_revealing_formula_prefix(
    prompt: &str,
    options: &[String],
    lang: Lang,
) -> Option<AmbiguityFinding> {
    let prompt_lower = prompt.to_lowercase();
    let name = extract_asked_name(&prompt_lower, lang)?;
    if name.is_empty() {
        return None;
    }

    let revealing_idx = options.iter().position(|opt| {
        let opt_lower = opt.trim().to_lowercase();
        opt_lower
            .strip_prefix(&name)
            .map(|rest| rest.trim_start().starts_with('='))
            .unwrap_or(false)
    })?;

    let plain_others = options
        .iter()
        .enumerate()
        .filter(|(i, opt)| *i != revealing_idx && !opt.contains('='))
        .count();

    if plain_others >= 2 {
        Some(AmbiguityFinding {
            rule: AmbiguityRule::RevealingFormulaPrefix,
            message: format!(
                "选项 '{}' 以 '{} =' 开头, 格式本身泄露了答案",
                options[revealing_idx], name
            ),
        })
    } else {
        None
    }
}

/// 从 "formula for X" / "X的公式" 里取出被问的命名量（小写）
fn extract_asked_name(prompt_lower: &str, lang: Lang) -> Option<String> {
    for pattern in keywords::formula_ask_patterns(lang) {
        if let Some(pos) = prompt_lower.find(pattern) {
            let name = match lang {
                Lang::Chinese => {
                    // 中文里命名量在模式之前："FCFF的公式是什么"
                    let before = &prompt_lower[..pos];
                    before
                        .chars()
                        .rev()
                        .take_while(|c| c.is_alphanumeric())
                        .collect::<Vec<char>>()
                        .into_iter()
                        .rev()
                        .collect::<String>()
                }
                _ => {
                    // 拉丁语系里命名量在模式之后："formula for FCFF?"
                    let after = &prompt_lower[pos + pattern.len()..];
                    after
                        .trim_start()
                        .chars()
                        .take_while(|c| !matches!(c, '?' | '.' | ',' | '!' | '？'))
                        .collect::<String>()
                        .trim()
                        .to_string()
                }
            };
            if !name.is_empty() {
                return Some(name);
            }
        }
    }
    None
}
