//! 文本分段服务 - 业务能力层
//!
//! 把抽象的章节元数据对齐回原始源文本：为每个章节找到它在全文里的
//! 跨度。定位策略按优先级依次降级（精确标题 → 重音归一化 → 显著词
//! 正则 → 滑动窗口相似度 → 最长显著词），定位不到的章节用邻居线性
//! 插值；定位成功率不足一半时整篇退化为"标记辅助等分"。
//!
//! 位置全程用字符下标计算，最后转回字节偏移，保证切片永远落在
//! 字符边界上。

use anyhow::Result;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::keywords;
use crate::models::{BoundaryStrategy, ChapterBoundary, ChapterMeta, Lang};
use crate::utils::{fold_accents, jaccard_similarity};
use crate::error::{AppError, ContentError};

/// 滑动窗口大小（字符）
const WINDOW_CHARS: usize = 500;
/// 滑动窗口步长（字符）
const WINDOW_STEP: usize = 250;
/// 边界吸附的回看/前看窗口（字符）
const SNAP_WINDOW: usize = 200;

/// 分段选项
#[derive(Debug, Clone)]
pub struct SegmentOptions {
    /// 滑动窗口接受阈值
    pub window_threshold: f64,
    /// 单章最小长度（字符）
    pub min_chars: usize,
    /// 单章最大长度（字符）
    pub max_chars: usize,
}

impl SegmentOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            window_threshold: config.segment_window_threshold,
            min_chars: config.segment_min_chars,
            max_chars: config.segment_max_chars,
        }
    }
}

/// 文本分段服务
pub struct SegmentService {
    options: SegmentOptions,
}

/// 单个章节的定位结果（字符下标）
#[derive(Debug, Clone, Copy)]
struct Located {
    char_pos: usize,
    strategy: BoundaryStrategy,
}

impl SegmentService {
    /// 创建新的分段服务
    pub fn new(config: &Config) -> Self {
        Self {
            options: SegmentOptions::from_config(config),
        }
    }

    /// 指定选项创建（测试和标定用）
    pub fn with_options(options: SegmentOptions) -> Self {
        Self { options }
    }

    /// 为每个章节解析出它在全文中的文本跨度
    ///
    /// 返回的跨度满足：`start[i] < end[i] <= start[i+1]`。
    pub fn extract_chapter_text(
        &self,
        full_text: &str,
        chapters: &[ChapterMeta],
    ) -> Result<Vec<ChapterBoundary>> {
        if chapters.is_empty() {
            return Err(AppError::Content(ContentError::EmptyChapterList).into());
        }
        let chars: Vec<char> = full_text.chars().collect();
        if chars.len() < chapters.len() * 2 {
            return Err(AppError::Content(ContentError::SourceTextTooShort {
                len: chars.len(),
            })
            .into());
        }

        // 字符下标 → 字节偏移 的映射表（末尾带哨兵）
        let mut byte_pos: Vec<usize> = full_text.char_indices().map(|(b, _)| b).collect();
        byte_pos.push(full_text.len());

        let lang = Lang::detect(full_text);

        // 大小写折叠和去重音的全文只算一遍, 每章复用
        let folded_text: Vec<char> = chars.iter().map(|c| lower_first(*c)).collect();
        let accentless_text: Vec<char> = folded_text
            .iter()
            .map(|c| fold_accents(&c.to_string()).chars().next().unwrap_or(*c))
            .collect();

        // 第一阶段：逐章尝试定位
        let mut located: Vec<Option<Located>> = chapters
            .iter()
            .map(|ch| {
                self.locate_chapter(
                    &chars,
                    &folded_text,
                    &accentless_text,
                    full_text,
                    &byte_pos,
                    ch,
                    lang,
                )
            })
            .collect();

        // 乱序的定位结果按失败处理, 否则破坏跨度有序性
        let mut last_pos: Option<usize> = None;
        for slot in located.iter_mut() {
            if let Some(loc) = slot {
                if last_pos.map(|p| loc.char_pos <= p).unwrap_or(false) {
                    debug!("定位结果乱序, 降级为插值: {}", loc.char_pos);
                    *slot = None;
                } else {
                    last_pos = Some(loc.char_pos);
                }
            }
        }

        let resolved = located.iter().filter(|l| l.is_some()).count();
        info!(
            "✂️ 章节定位: {}/{} 个章节直接定位成功 (语言: {})",
            resolved,
            chapters.len(),
            lang.code()
        );

        // 第二阶段：插值或整篇等分
        let starts: Vec<Located> = if resolved >= chapters.len() / 2 && resolved > 0 {
            interpolate_missing(&located, chars.len())
        } else {
            warn!("✂️ 定位成功率不足一半, 退化为标记辅助等分");
            self.equal_division(&chars, full_text, &byte_pos, chapters.len())
        };

        // 第三阶段：吸附到自然断点并裁剪长度
        self.build_boundaries(full_text, &chars, &byte_pos, chapters, starts)
    }

    /// 按优先级依次尝试五种定位策略
    #[allow(clippy::too_many_arguments)]
    fn locate_chapter(
        &self,
        chars: &[char],
        folded_text: &[char],
        accentless_text: &[char],
        full_text: &str,
        byte_pos: &[usize],
        chapter: &ChapterMeta,
        lang: Lang,
    ) -> Option<Located> {
        let title = chapter.title.trim();
        if title.is_empty() {
            return None;
        }

        // 1. 标题精确匹配（大小写不敏感）
        let folded_title: Vec<char> = title.chars().map(lower_first).collect();
        if let Some(pos) = find_chars(folded_text, &folded_title) {
            return Some(Located {
                char_pos: pos,
                strategy: BoundaryStrategy::ExactTitle,
            });
        }

        // 2. 重音归一化后匹配
        let accentless_title: Vec<char> = fold_accents(&title.to_lowercase()).chars().collect();
        if let Some(pos) = find_chars(accentless_text, &accentless_title) {
            return Some(Located {
                char_pos: pos,
                strategy: BoundaryStrategy::AccentFolded,
            });
        }

        // 3. 标题显著词正则（前 3-4 个非停用词, 宽容分隔符）
        let significant = significant_tokens(title, lang);
        if significant.len() >= 2 {
            let pattern = significant
                .iter()
                .take(4)
                .map(|t| regex::escape(t))
                .collect::<Vec<_>>()
                .join(r"[\s\S]{0,30}?");
            if let Ok(re) = Regex::new(&format!("(?i){}", pattern)) {
                if let Some(m) = re.find(full_text) {
                    let char_pos = byte_to_char(byte_pos, m.start());
                    return Some(Located {
                        char_pos,
                        strategy: BoundaryStrategy::TokenRegex,
                    });
                }
            }
        }

        // 4. 滑动窗口相似度（标题 + 摘要 + 关键概念 对固定窗口）
        let probe = {
            let mut p = title.to_string();
            if let Some(summary) = &chapter.summary {
                p.push(' ');
                p.push_str(summary);
            }
            if !chapter.key_concepts.is_empty() {
                p.push(' ');
                p.push_str(&chapter.key_concepts.join(" "));
            }
            p
        };
        if let Some(pos) = self.scan_windows(chars, &probe) {
            return Some(Located {
                char_pos: pos,
                strategy: BoundaryStrategy::WindowOverlap,
            });
        }

        // 5. 兜底：最长显著词检索
        let longest = significant_tokens(title, lang)
            .into_iter()
            .max_by_key(|t| t.chars().count())?;
        let folded_word: Vec<char> = longest.chars().map(lower_first).collect();
        find_chars(folded_text, &folded_word).map(|pos| Located {
            char_pos: pos,
            strategy: BoundaryStrategy::LongestWord,
        })
    }

    /// 滑动窗口扫描, 返回得分最高且达到阈值的窗口起点
    fn scan_windows(&self, chars: &[char], probe: &str) -> Option<usize> {
        if chars.len() < WINDOW_CHARS / 2 {
            return None;
        }
        let mut best: Option<(usize, f64)> = None;
        let mut start = 0;
        while start < chars.len() {
            let end = (start + WINDOW_CHARS).min(chars.len());
            let window: String = chars[start..end].iter().collect();
            let score = jaccard_similarity(probe, &window);
            if best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((start, score));
            }
            if end == chars.len() {
                break;
            }
            start += WINDOW_STEP;
        }
        best.filter(|(_, score)| *score >= self.options.window_threshold)
            .map(|(pos, _)| pos)
    }

    /// 标记辅助等分：独立探测通用标题标记, 把每章分配到期望等分点
    /// 附近最近的标记上
    fn equal_division(
        &self,
        chars: &[char],
        full_text: &str,
        byte_pos: &[usize],
        chapter_count: usize,
    ) -> Vec<Located> {
        let markers = detect_heading_markers(full_text)
            .into_iter()
            .map(|b| byte_to_char(byte_pos, b))
            .collect::<Vec<usize>>();
        debug!("✂️ 探测到 {} 个通用标题标记", markers.len());

        let total = chars.len();
        let radius = (total / (chapter_count * 2)).max(1);
        let mut starts = Vec::with_capacity(chapter_count);
        let mut prev = 0usize;

        for k in 0..chapter_count {
            let expected = total * k / chapter_count;
            // 期望点附近找最近的标记
            let snapped = markers
                .iter()
                .filter(|m| m.abs_diff(expected) <= radius && **m > prev)
                .min_by_key(|m| m.abs_diff(expected))
                .copied()
                .unwrap_or(expected);
            let pos = snapped.max(if k == 0 { 0 } else { prev + 1 });
            starts.push(Located {
                char_pos: pos.min(total.saturating_sub(1)),
                strategy: BoundaryStrategy::EqualDivision,
            });
            prev = pos;
        }
        starts
    }

    /// 吸附自然断点、裁剪长度、产出最终跨度
    fn build_boundaries(
        &self,
        full_text: &str,
        chars: &[char],
        byte_pos: &[usize],
        chapters: &[ChapterMeta],
        starts: Vec<Located>,
    ) -> Result<Vec<ChapterBoundary>> {
        let total = chars.len();
        let n = chapters.len();

        // 吸附每个起点到自然断点（第一个章节从 0 开始, 不吸附）
        let mut snapped: Vec<Located> = starts
            .iter()
            .enumerate()
            .map(|(i, loc)| {
                if i == 0 {
                    Located {
                        char_pos: 0,
                        strategy: loc.strategy,
                    }
                } else {
                    Located {
                        char_pos: snap_to_break(chars, loc.char_pos),
                        strategy: loc.strategy,
                    }
                }
            })
            .collect();

        // 吸附可能破坏有序性, 强制回来
        for i in 1..n {
            if snapped[i].char_pos <= snapped[i - 1].char_pos {
                snapped[i].char_pos = (snapped[i - 1].char_pos + 1).min(total);
            }
        }

        let mut boundaries = Vec::with_capacity(n);
        for i in 0..n {
            let start = snapped[i].char_pos;
            let natural_end = if i + 1 < n { snapped[i + 1].char_pos } else { total };

            // 超长跨度截断后向回吸附
            let mut end = natural_end;
            if end.saturating_sub(start) > self.options.max_chars {
                let truncated = start + self.options.max_chars;
                let resnapped = snap_backward(chars, truncated, start);
                end = resnapped.max(start + self.options.min_chars.min(self.options.max_chars));
                end = end.min(natural_end);
            }
            // 过短跨度在不越过下一章起点的前提下前伸
            if end.saturating_sub(start) < self.options.min_chars {
                end = (start + self.options.min_chars).min(natural_end);
            }
            if end <= start {
                end = (start + 1).min(total);
            }

            let start_byte = byte_pos[start];
            let end_byte = byte_pos[end];
            boundaries.push(ChapterBoundary {
                index: i,
                title: chapters[i].title.clone(),
                start_position: start_byte,
                end_position: end_byte,
                text: full_text[start_byte..end_byte].to_string(),
                strategy: snapped[i].strategy,
            });
        }

        Ok(boundaries)
    }
}

// ========== 纯辅助函数 ==========

/// 取 char 的首个小写形态（保持一对一, 不改变下标映射）
fn lower_first(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// 在字符切片里找子串, 返回起始字符下标
fn find_chars(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// 字节偏移 → 字符下标
fn byte_to_char(byte_pos: &[usize], byte: usize) -> usize {
    match byte_pos.binary_search(&byte) {
        Ok(idx) => idx,
        Err(idx) => idx.saturating_sub(1),
    }
}

/// 标题里的显著词（去停用词, 保持原顺序）
fn significant_tokens(title: &str, lang: Lang) -> Vec<String> {
    let stop = keywords::stopwords(lang);
    title
        .split_whitespace()
        .map(|t| {
            t.trim_matches(|c: char| !c.is_alphanumeric())
                .to_string()
        })
        .filter(|t| t.chars().count() > 2 && !stop.contains(t.to_lowercase().as_str()))
        .collect()
}

/// 把候选位置吸附到最近的自然断点
///
/// 回看/前看窗口内优先找段落断（空行）, 其次句末标点, 都没有就原样返回。
fn snap_to_break(chars: &[char], pos: usize) -> usize {
    let total = chars.len();
    if pos == 0 || pos >= total {
        return pos.min(total);
    }
    let lo = pos.saturating_sub(SNAP_WINDOW);
    let hi = (pos + SNAP_WINDOW).min(total);

    // 段落断：两个连续换行, 吸附到断后第一个字符
    let mut best_para: Option<usize> = None;
    for i in lo..hi.saturating_sub(1) {
        if chars[i] == '\n' && chars[i + 1] == '\n' {
            let candidate = i + 2;
            if best_para
                .map(|b| candidate.abs_diff(pos) < b.abs_diff(pos))
                .unwrap_or(true)
            {
                best_para = Some(candidate);
            }
        }
    }
    if let Some(p) = best_para {
        return p.min(total);
    }

    // 句末标点：吸附到标点后
    let mut best_sentence: Option<usize> = None;
    for i in lo..hi {
        if matches!(chars[i], '.' | '!' | '?' | '。' | '！' | '？' | '\n') {
            let candidate = i + 1;
            if best_sentence
                .map(|b| candidate.abs_diff(pos) < b.abs_diff(pos))
                .unwrap_or(true)
            {
                best_sentence = Some(candidate);
            }
        }
    }
    best_sentence.map(|p| p.min(total)).unwrap_or(pos)
}

/// 从 pos 向回找最近的自然断点（截断超长跨度用）, 不越过 floor
fn snap_backward(chars: &[char], pos: usize, floor: usize) -> usize {
    let hi = pos.min(chars.len());
    let lo = floor.max(hi.saturating_sub(SNAP_WINDOW));
    for i in (lo..hi).rev() {
        if chars[i] == '\n' && i > 0 && chars[i - 1] == '\n' {
            return i + 1;
        }
    }
    for i in (lo..hi).rev() {
        if matches!(chars[i], '.' | '!' | '?' | '。' | '！' | '？' | '\n') {
            return (i + 1).min(hi);
        }
    }
    hi
}

/// 插值补全未定位章节的起点
///
/// 相邻已定位点之间线性均摊；开头/结尾只有单侧邻居时向 0 / 文末外推。
fn interpolate_missing(located: &[Option<Located>], total_chars: usize) -> Vec<Located> {
    let n = located.len();
    let mut out: Vec<Located> = Vec::with_capacity(n);

    // 已定位点的 (章节下标, 位置)
    let anchors: Vec<(usize, usize)> = located
        .iter()
        .enumerate()
        .filter_map(|(i, l)| l.as_ref().map(|loc| (i, loc.char_pos)))
        .collect();

    for (i, slot) in located.iter().enumerate() {
        if let Some(loc) = slot {
            out.push(*loc);
            continue;
        }

        let prev = anchors.iter().rev().find(|(ai, _)| *ai < i).copied();
        let next = anchors.iter().find(|(ai, _)| *ai > i).copied();

        let pos = match (prev, next) {
            // 两侧都有锚点：线性插值
            (Some((pi, pp)), Some((ni, np))) => pp + (np - pp) * (i - pi) / (ni - pi),
            // 只有前侧：向文末外推
            (Some((pi, pp)), None) => pp + (total_chars - pp) * (i - pi) / (n - pi),
            // 只有后侧：从文首外推
            (None, Some((ni, np))) => np * i / ni.max(1),
            // 没有锚点（调用方保证不会发生）：等分
            (None, None) => total_chars * i / n,
        };

        out.push(Located {
            char_pos: pos.min(total_chars.saturating_sub(1)),
            strategy: BoundaryStrategy::Interpolated,
        });
    }

    // 插值结果保证严格递增
    for i in 1..out.len() {
        if out[i].char_pos <= out[i - 1].char_pos {
            out[i].char_pos = (out[i - 1].char_pos + 1).min(total_chars);
        }
    }
    out
}

/// 独立探测通用标题标记, 返回字节偏移
fn detect_heading_markers(full_text: &str) -> Vec<usize> {
    let patterns = [
        // 编号小节："3. " / "12) "
        r"(?m)^\s{0,4}\d{1,3}[\.)]\s+\S",
        // "Chapter N" / "Capítulo N" / "Unidad N"
        r"(?mi)^\s{0,4}(chapter|cap[íi]tulo|unidad|tema|lecci[óo]n)\s+\d+",
        // 中文章节
        r"(?m)^第[一二三四五六七八九十百\d]+[章节讲课]",
        // 罗马数字小节
        r"(?m)^\s{0,4}[IVXLCDM]{1,7}[\.)]\s+",
        // 全大写标题行
        r"(?m)^[A-ZÁÉÍÓÚÑ][A-ZÁÉÍÓÚÑ \d:,]{8,}$",
    ];

    let mut markers = Vec::new();
    for pat in patterns {
        if let Ok(re) = Regex::new(pat) {
            for m in re.find_iter(full_text) {
                markers.push(m.start());
            }
        }
    }
    markers.sort_unstable();
    markers.dedup();
    markers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> SegmentOptions {
        SegmentOptions {
            window_threshold: 0.5,
            min_chars: 10,
            max_chars: 100_000,
        }
    }

    fn service() -> SegmentService {
        SegmentService::with_options(options())
    }

    fn meta(title: &str) -> ChapterMeta {
        ChapterMeta::new(title)
    }

    fn assert_ordered(boundaries: &[ChapterBoundary], text_len: usize) {
        for b in boundaries {
            assert!(b.start_position < b.end_position, "章节 {} 跨度为空", b.index);
            assert!(b.end_position <= text_len);
        }
        for pair in boundaries.windows(2) {
            assert!(
                pair[0].end_position <= pair[1].start_position,
                "章节 {} 与 {} 跨度重叠",
                pair[0].index,
                pair[1].index
            );
        }
    }

    fn sample_doc() -> String {
        let mut doc = String::new();
        doc.push_str("Introduction to Corporate Finance\n\n");
        doc.push_str(&"The firm raises capital from investors and allocates it to projects. ".repeat(10));
        doc.push_str("\n\nValuation of Cash Flows\n\n");
        doc.push_str(&"Discounting translates future cash flows into present values. ".repeat(10));
        doc.push_str("\n\nMergers and Acquisitions\n\n");
        doc.push_str(&"Merger waves are triggered by industry-level economic shocks. ".repeat(10));
        doc
    }

    #[test]
    fn test_exact_title_resolution() {
        let doc = sample_doc();
        let chapters = vec![
            meta("Introduction to Corporate Finance"),
            meta("Valuation of Cash Flows"),
            meta("Mergers and Acquisitions"),
        ];
        let boundaries = service()
            .extract_chapter_text(&doc, &chapters)
            .expect("分段应成功");

        assert_eq!(boundaries.len(), 3);
        assert_eq!(boundaries[0].strategy, BoundaryStrategy::ExactTitle);
        assert!(boundaries[2].text.contains("Merger waves"));
        assert_ordered(&boundaries, doc.len());
    }

    #[test]
    fn test_case_insensitive_match() {
        let doc = sample_doc();
        let chapters = vec![
            meta("INTRODUCTION TO CORPORATE FINANCE"),
            meta("valuation of cash flows"),
            meta("Mergers And Acquisitions"),
        ];
        let boundaries = service()
            .extract_chapter_text(&doc, &chapters)
            .expect("分段应成功");
        assert!(boundaries
            .iter()
            .all(|b| b.strategy == BoundaryStrategy::ExactTitle));
        assert_ordered(&boundaries, doc.len());
    }

    #[test]
    fn test_accent_folded_match() {
        let mut doc = String::new();
        doc.push_str("Introduccion a las finanzas\n\n");
        doc.push_str(&"La empresa capta capital de los inversores para sus proyectos. ".repeat(10));
        doc.push_str("\n\nValoracion de flujos\n\n");
        doc.push_str(&"El descuento traduce flujos futuros a valores presentes. ".repeat(10));

        let chapters = vec![meta("Introducción a las finanzas"), meta("Valoración de flujos")];
        let boundaries = service()
            .extract_chapter_text(&doc, &chapters)
            .expect("分段应成功");
        assert_eq!(boundaries[0].strategy, BoundaryStrategy::AccentFolded);
        assert_ordered(&boundaries, doc.len());
    }

    #[test]
    fn test_degraded_interpolation_scenario() {
        // 5 个章节只有 2 个标题可定位, 其余 3 个靠插值, 且跨度仍然有序
        let mut doc = String::new();
        doc.push_str("Opening Remarks on Capital\n\n");
        doc.push_str(&"Capital allocation is the core task of the firm. ".repeat(30));
        doc.push_str("\n\nSection two has no recognizable heading here. ");
        doc.push_str(&"Plain prose continues about markets and prices. ".repeat(30));
        doc.push_str(&"More prose with different vocabulary entirely follows now. ".repeat(30));
        doc.push_str("\n\nClosing Notes on Governance\n\n");
        doc.push_str(&"Boards monitor managers on behalf of shareholders. ".repeat(30));

        let chapters = vec![
            meta("Opening Remarks on Capital"),
            meta("Xqzw Unfindable Alpha"),
            meta("Yklm Unfindable Beta"),
            meta("Zpqr Unfindable Gamma"),
            meta("Closing Notes on Governance"),
        ];

        let boundaries = service()
            .extract_chapter_text(&doc, &chapters)
            .expect("分段应成功");

        assert_eq!(boundaries.len(), 5);
        let interpolated = boundaries
            .iter()
            .filter(|b| b.strategy == BoundaryStrategy::Interpolated)
            .count();
        assert!(interpolated >= 2, "应有插值章节, 实际 {}", interpolated);
        assert_ordered(&boundaries, doc.len());
    }

    #[test]
    fn test_equal_division_with_markers() {
        // 标题完全找不到, 退化为标记辅助等分
        let mut doc = String::new();
        for i in 1..=4 {
            doc.push_str(&format!("{}. Section heading line\n\n", i));
            doc.push_str(&"Body prose sentence repeated for bulk and padding. ".repeat(25));
            doc.push('\n');
        }

        let chapters = vec![
            meta("没有对应的标题甲"),
            meta("没有对应的标题乙"),
            meta("没有对应的标题丙"),
            meta("没有对应的标题丁"),
        ];
        let boundaries = service()
            .extract_chapter_text(&doc, &chapters)
            .expect("分段应成功");

        assert_eq!(boundaries.len(), 4);
        assert!(boundaries
            .iter()
            .all(|b| b.strategy == BoundaryStrategy::EqualDivision));
        assert_ordered(&boundaries, doc.len());
    }

    #[test]
    fn test_oversized_span_is_truncated() {
        let opts = SegmentOptions {
            window_threshold: 0.5,
            min_chars: 10,
            max_chars: 300,
        };
        let service = SegmentService::with_options(opts);

        let mut doc = String::new();
        doc.push_str("Single Long Chapter\n\n");
        doc.push_str(&"A sentence that keeps going for quite a while here. ".repeat(40));

        let boundaries = service
            .extract_chapter_text(&doc, &[meta("Single Long Chapter")])
            .expect("分段应成功");
        let span = boundaries[0].end_position - boundaries[0].start_position;
        assert!(span <= 320, "超长跨度应被截断, 实际 {}", span);
    }

    #[test]
    fn test_boundaries_respect_char_boundaries() {
        // 多字节内容切片不会 panic 即为通过
        let mut doc = String::new();
        doc.push_str("第一章 资本结构\n\n");
        doc.push_str(&"企业的资本结构决定了风险与收益在股东和债权人之间的分配。".repeat(15));
        doc.push_str("\n\n第二章 并购浪潮\n\n");
        doc.push_str(&"并购浪潮往往由行业层面的经济冲击触发，监管放松会放大它。".repeat(15));

        let chapters = vec![meta("第一章 资本结构"), meta("第二章 并购浪潮")];
        let boundaries = service()
            .extract_chapter_text(&doc, &chapters)
            .expect("分段应成功");
        assert_eq!(boundaries.len(), 2);
        assert!(boundaries[1].text.contains("并购浪潮"));
        assert_ordered(&boundaries, doc.len());
    }

    #[test]
    fn test_empty_chapter_list_is_error() {
        assert!(service().extract_chapter_text("some text", &[]).is_err());
    }

    #[test]
    fn test_snap_prefers_paragraph_break() {
        let text = "First paragraph ends here.\n\nSecond paragraph starts.";
        let chars: Vec<char> = text.chars().collect();
        // 候选点落在第二段中间, 应吸附到空行之后
        let snapped = snap_to_break(&chars, 30);
        let after_break = text.find("\n\n").unwrap() + 2;
        assert_eq!(snapped, after_break);
    }

    #[test]
    fn test_significant_tokens_drop_stopwords() {
        let tokens = significant_tokens("The Valuation of the Firm", Lang::English);
        assert_eq!(tokens, vec!["Valuation".to_string(), "Firm".to_string()]);
    }
}
