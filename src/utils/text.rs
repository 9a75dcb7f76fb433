//! 文本工具模块
//!
//! 提供各个启发式检测器共用的分词、相似度和归一化函数。
//! 相似度统一使用 token 集合的 Jaccard 系数（交集/并集），
//! 这是一个可解释的廉价近似，不是统计学习模型。

use std::collections::HashSet;

/// 把文本切分为小写 token 集合
///
/// 按空白切分，丢弃长度 ≤ 2 的 token（冠词、介词之类的噪音）。
/// 对 CJK 文本没有空格可切，退化为按字符二元组切分。
pub fn tokenize(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase();
    let mut tokens: HashSet<String> = lower
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.chars().count() > 2)
        .map(|w| w.to_string())
        .collect();

    // CJK 内容基本不含空格，补充字符二元组
    let cjk: Vec<char> = lower.chars().filter(|c| is_cjk(*c)).collect();
    if cjk.len() >= 2 {
        for pair in cjk.windows(2) {
            tokens.insert(pair.iter().collect());
        }
    }

    tokens
}

/// 计算两段文本的 token 集合 Jaccard 相似度
///
/// 返回值范围 [0, 1]，两个空集合视为相似度 0。
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let set_a = tokenize(a);
    let set_b = tokenize(b);

    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();

    intersection as f64 / union as f64
}

/// token 集合重叠比例（相对较短一方）
///
/// 语义验证用它衡量 "题目+答案" 与事实陈述的覆盖程度，
/// 比 Jaccard 对长度差异更不敏感。
pub fn overlap_ratio(a: &str, b: &str) -> f64 {
    let set_a = tokenize(a);
    let set_b = tokenize(b);

    let smaller = set_a.len().min(set_b.len());
    if smaller == 0 {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    intersection as f64 / smaller as f64
}

/// 去掉常见西语/法语重音符号
///
/// 分段器的第二档匹配策略用它做重音归一化（"Introducción" == "Introduccion"）。
pub fn fold_accents(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ä' | 'ã' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            'Á' | 'À' | 'Â' | 'Ä' | 'Ã' => 'A',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'O',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'Ñ' => 'N',
            'Ç' => 'C',
            _ => c,
        })
        .collect()
}

/// 是否为 CJK 字符
pub fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{3000}'..='\u{303F}'
        | '\u{FF00}'..='\u{FFEF}')
}

/// 文本是否以数字/货币内容为主
///
/// 选项里大半是数字时（计算题），歧义检测直接跳过。
pub fn is_mostly_numeric(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    let meaningful: Vec<char> = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    let numericish = meaningful
        .iter()
        .filter(|c| {
            c.is_ascii_digit()
                || matches!(c, '.' | ',' | '%' | '$' | '€' | '¥' | '-' | '+' | '(' | ')' | '/')
        })
        .count();
    numericish as f64 / meaningful.len() as f64 > 0.6
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

/// 按字符数截断文本，保证落在字符边界上
///
/// 拼入提示词前裁剪源文本时使用，直接用字节截断会把多字节字符切坏。
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_drops_short_tokens() {
        let tokens = tokenize("What is the formula for WACC");
        assert!(tokens.contains("formula"));
        assert!(tokens.contains("wacc"));
        // "is" 长度 2，被丢弃
        assert!(!tokens.contains("is"));
    }

    #[test]
    fn test_jaccard_identical_text() {
        let sim = jaccard_similarity(
            "economic shocks drive merger waves",
            "economic shocks drive merger waves",
        );
        assert!((sim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_jaccard_disjoint_text() {
        let sim = jaccard_similarity("alpha beta gamma", "delta epsilon zeta");
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_jaccard_empty_input() {
        assert_eq!(jaccard_similarity("", "anything here"), 0.0);
    }

    #[test]
    fn test_jaccard_cjk_bigrams() {
        // 中文无空格，二元组保证相似的句子仍有重叠
        let sim = jaccard_similarity("企业合并的主要动因", "企业合并的基本动因");
        assert!(sim > 0.4, "实际相似度: {}", sim);
    }

    #[test]
    fn test_fold_accents() {
        assert_eq!(fold_accents("Introducción"), "Introduccion");
        assert_eq!(fold_accents("Capítulo"), "Capitulo");
    }

    #[test]
    fn test_is_mostly_numeric() {
        assert!(is_mostly_numeric("42.5%"));
        assert!(is_mostly_numeric("$1,250.00"));
        assert!(!is_mostly_numeric("Economic shocks"));
        assert!(!is_mostly_numeric(""));
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        let text = "企业合并estudio";
        let cut = truncate_chars(text, 4);
        assert_eq!(cut, "企业合并");
    }

    #[test]
    fn test_overlap_ratio_short_against_long() {
        let short = "free cash flow";
        let long = "the free cash flow to the firm is computed from operating income";
        assert!(overlap_ratio(short, long) > 0.5);
    }
}
