use crate::utils::is_cjk;

/// 内容语言
///
/// 启发式检测器的关键词表按语言区分，检测到的语言决定查哪张表。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Lang {
    /// 英语
    English,
    /// 西班牙语
    Spanish,
    /// 中文
    Chinese,
}

impl Lang {
    /// 获取语言代码
    pub fn code(self) -> &'static str {
        match self {
            Lang::English => "en",
            Lang::Spanish => "es",
            Lang::Chinese => "zh",
        }
    }

    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            Lang::English => "English",
            Lang::Spanish => "Español",
            Lang::Chinese => "中文",
        }
    }

    /// 从语言代码解析
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_lowercase().as_str() {
            "en" | "en-us" | "en-gb" => Some(Lang::English),
            "es" | "es-es" | "es-mx" => Some(Lang::Spanish),
            "zh" | "zh-cn" | "zh-tw" => Some(Lang::Chinese),
            _ => None,
        }
    }

    /// 检测文本的主要语言
    ///
    /// CJK 字符占比超过 20% 判为中文；否则统计西语特征词和
    /// 特有字符（¿¡ñá 等）与英语特征词，多者胜出。样本只取前 2000 字符。
    pub fn detect(text: &str) -> Self {
        let sample: String = text.chars().take(2000).collect();
        if sample.trim().is_empty() {
            return Lang::English;
        }

        let total = sample.chars().filter(|c| !c.is_whitespace()).count().max(1);
        let cjk = sample.chars().filter(|c| is_cjk(*c)).count();
        if cjk as f64 / total as f64 > 0.2 {
            return Lang::Chinese;
        }

        let lower = sample.to_lowercase();
        let mut es_score = lower
            .chars()
            .filter(|c| matches!(c, '¿' | '¡' | 'ñ' | 'á' | 'é' | 'í' | 'ó' | 'ú'))
            .count()
            * 2;
        for marker in [" el ", " la ", " los ", " las ", " una ", " según ", " qué ", " cuál "] {
            es_score += lower.matches(marker).count();
        }

        let mut en_score = 0;
        for marker in [" the ", " and ", " which ", " what ", " with ", " from ", " that "] {
            en_score += lower.matches(marker).count();
        }

        if es_score > en_score {
            Lang::Spanish
        } else {
            Lang::English
        }
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
