//! 多语言关键词表
//!
//! 启发式检测器（歧义检测、行政内容过滤、分段、兜底内容）使用的
//! 关键词和模式全部集中在这里作为数据维护，新增语言只需要加表，
//! 不需要改检测逻辑。目前覆盖 en / es / zh 三个语言。

use phf::{phf_set, Set};

use crate::models::Lang;

// ========== 疑问词与限定词（歧义检测） ==========

/// 宽泛疑问词：以它开头又没有限定词的题干容易有多个可辩护答案
static VAGUE_INTERROGATIVES_EN: Set<&'static str> = phf_set! {
    "which", "what",
};

static VAGUE_INTERROGATIVES_ES: Set<&'static str> = phf_set! {
    "cuál", "cual", "qué", "que", "cuáles", "cuales",
};

static VAGUE_INTERROGATIVES_ZH: Set<&'static str> = phf_set! {
    "哪个", "哪些", "什么", "何种",
};

/// 限定词：出现任意一个即认为题干已消歧
static QUALIFIERS_EN: Set<&'static str> = phf_set! {
    "primary", "best", "only", "main", "most", "first", "principal",
    "correct", "key", "chief", "dominant", "largest", "smallest",
};

static QUALIFIERS_ES: Set<&'static str> = phf_set! {
    "principal", "mejor", "único", "unico", "más", "mas", "primero",
    "correcto", "correcta", "clave", "dominante", "mayor", "menor",
};

static QUALIFIERS_ZH: Set<&'static str> = phf_set! {
    "主要", "最佳", "唯一", "首要", "最", "关键", "核心", "正确",
};

// ========== 抽象类别名词（类别堆叠检测） ==========

static CATEGORY_NOUNS_EN: Set<&'static str> = phf_set! {
    "hypothesis", "theory", "method", "model", "factor", "approach",
    "principle", "strategy", "effect", "law", "concept", "framework",
};

static CATEGORY_NOUNS_ES: Set<&'static str> = phf_set! {
    "hipótesis", "hipotesis", "teoría", "teoria", "método", "metodo",
    "modelo", "factor", "enfoque", "principio", "estrategia", "efecto",
    "ley", "concepto", "marco",
};

static CATEGORY_NOUNS_ZH: Set<&'static str> = phf_set! {
    "假说", "理论", "方法", "模型", "因素", "途径", "原则", "策略",
    "效应", "定律", "概念", "框架",
};

// ========== 包含性连词与二元习语 ==========

/// 连词（前后带空格避免误伤 "android" 之类的词）
pub static INCLUSIVE_CONJUNCTIONS_EN: &[&str] = &[" and ", " or ", " both "];
pub static INCLUSIVE_CONJUNCTIONS_ES: &[&str] = &[" y ", " o ", " ambos ", " ambas "];
pub static INCLUSIVE_CONJUNCTIONS_ZH: &[&str] = &["和", "或者", "以及", "并且", "同时"];

/// 公认的二元习语，不算歧义
pub static BINARY_IDIOMS_EN: &[&str] = &["true or false", "yes or no"];
pub static BINARY_IDIOMS_ES: &[&str] = &["verdadero o falso", "sí o no", "si o no"];
pub static BINARY_IDIOMS_ZH: &[&str] = &["是或否", "对或错", "正确或错误"];

// ========== 计算结果记忆型题目 ==========

/// 命名计算量：题干提到它们、选项又是一排数字时，
/// 这题考的是"背答案"而不是理解
static CALCULATION_TERMS_EN: Set<&'static str> = phf_set! {
    "ratio", "rate", "value", "discounted", "yield", "margin",
    "return", "npv", "wacc", "fcff", "fcfe", "irr", "percentage",
};

static CALCULATION_TERMS_ES: Set<&'static str> = phf_set! {
    "ratio", "tasa", "valor", "descontado", "rendimiento", "margen",
    "retorno", "porcentaje", "van", "tir",
};

static CALCULATION_TERMS_ZH: Set<&'static str> = phf_set! {
    "比率", "利率", "价值", "折现", "收益率", "增长率", "百分比", "净现值",
};

// ========== 同义词聚类 ==========

pub static SYNONYM_GROUPS_EN: &[&[&str]] = &[
    &["increase", "rise", "grow", "expand", "climb"],
    &["decrease", "decline", "fall", "shrink", "reduce", "drop"],
    &["important", "significant", "crucial", "essential", "key"],
    &["cause", "reason", "driver", "origin"],
    &["benefit", "advantage", "gain", "upside"],
];

pub static SYNONYM_GROUPS_ES: &[&[&str]] = &[
    &["aumentar", "crecer", "subir", "incrementar", "expandir"],
    &["disminuir", "caer", "bajar", "reducir", "contraer"],
    &["importante", "significativo", "crucial", "esencial", "clave"],
    &["causa", "razón", "razon", "motivo", "origen"],
    &["beneficio", "ventaja", "ganancia"],
];

pub static SYNONYM_GROUPS_ZH: &[&[&str]] = &[
    &["增加", "上升", "增长", "扩大", "提高"],
    &["减少", "下降", "收缩", "降低", "缩小"],
    &["重要", "关键", "核心", "必要"],
    &["原因", "动因", "起因", "缘由"],
    &["好处", "优势", "收益", "益处"],
];

// ========== 公式/定义型题干 ==========

/// 题干在索要某个命名量的公式或定义
pub static FORMULA_ASK_PATTERNS_EN: &[&str] = &["formula for", "definition of", "equation for"];
pub static FORMULA_ASK_PATTERNS_ES: &[&str] = &["fórmula de", "formula de", "fórmula del", "formula del", "definición de", "definicion de"];
pub static FORMULA_ASK_PATTERNS_ZH: &[&str] = &["的公式", "的定义", "计算公式"];

// ========== 行政内容（非学科内容）过滤 ==========

/// 高精度正则（先于关键词表检查，大小写不敏感地编译）
pub static ADMIN_PATTERNS_EN: &[&str] = &[
    r"how many (parts|sections|questions|modules) does the (final |midterm )?(exam|test|course)",
    r"what is the (main |primary )?objective of (the|this) course",
    r"when is the (final |midterm )?(exam|deadline|due date)",
    r"how (is|will) the (course|exam) (be )?graded",
];

pub static ADMIN_PATTERNS_ES: &[&str] = &[
    r"cuántas partes tiene el (examen|curso)",
    r"cuantas partes tiene el (examen|curso)",
    r"cuál es el objetivo (principal )?del curso",
    r"cual es el objetivo (principal )?del curso",
    r"cuándo es el examen",
];

pub static ADMIN_PATTERNS_ZH: &[&str] = &[
    r"考试.{0,4}(有|分)(几|多少).{0,2}部分",
    r"(本|这门)课程的(主要)?(目标|目的)是什么",
    r"什么时候(考试|截止)",
];

/// 行政词汇表：考试形式 / 课程结构 / 资料 / 时间安排 / 角色
static ADMIN_KEYWORDS_EN: Set<&'static str> = phf_set! {
    // 考试形式
    "exam format", "midterm", "final exam", "passing grade", "grading",
    "rubric", "multiple attempts", "retake",
    // 课程结构
    "syllabus", "course outline", "course objective", "course structure",
    "number of modules", "course units",
    // 资料
    "textbook", "course materials", "slides", "handout", "bibliography",
    // 时间安排
    "deadline", "due date", "office hours", "course schedule", "academic calendar",
    // 角色
    "professor", "instructor", "teaching assistant", "course coordinator", "tutor",
};

static ADMIN_KEYWORDS_ES: Set<&'static str> = phf_set! {
    "formato del examen", "parcial", "examen final", "nota de aprobación",
    "calificación", "calificacion", "rúbrica", "rubrica",
    "programa del curso", "temario", "objetivo del curso", "estructura del curso",
    "libro de texto", "materiales del curso", "diapositivas", "bibliografía", "bibliografia",
    "fecha límite", "fecha limite", "fecha de entrega", "horario de oficina", "cronograma",
    "profesor", "docente", "ayudante", "coordinador", "tutor",
};

static ADMIN_KEYWORDS_ZH: Set<&'static str> = phf_set! {
    "考试形式", "期中考试", "期末考试", "及格线", "评分标准", "补考",
    "课程大纲", "教学大纲", "课程目标", "课程结构", "课程单元",
    "教材", "课件", "讲义", "参考书目",
    "截止日期", "提交时间", "答疑时间", "课程安排", "校历",
    "教授", "讲师", "助教", "课程负责人", "辅导员",
};

// ========== 停用词（分段器显著词筛选） ==========

static STOPWORDS_EN: Set<&'static str> = phf_set! {
    "the", "a", "an", "of", "and", "or", "in", "on", "to", "for",
    "with", "from", "by", "at", "is", "are", "was", "were", "this",
    "that", "these", "those", "its", "as", "be", "been",
};

static STOPWORDS_ES: Set<&'static str> = phf_set! {
    "el", "la", "los", "las", "un", "una", "unos", "unas", "de", "del",
    "y", "o", "en", "a", "al", "por", "para", "con", "es", "son",
    "este", "esta", "estos", "estas", "su", "sus", "como", "que",
};

static STOPWORDS_ZH: Set<&'static str> = phf_set! {
    "的", "了", "和", "与", "在", "是", "有", "及", "或", "等",
    "对", "从", "上", "中", "下", "为", "以", "之",
};

// ========== 按语言取表 ==========

pub fn vague_interrogatives(lang: Lang) -> &'static Set<&'static str> {
    match lang {
        Lang::English => &VAGUE_INTERROGATIVES_EN,
        Lang::Spanish => &VAGUE_INTERROGATIVES_ES,
        Lang::Chinese => &VAGUE_INTERROGATIVES_ZH,
    }
}

pub fn qualifiers(lang: Lang) -> &'static Set<&'static str> {
    match lang {
        Lang::English => &QUALIFIERS_EN,
        Lang::Spanish => &QUALIFIERS_ES,
        Lang::Chinese => &QUALIFIERS_ZH,
    }
}

pub fn category_nouns(lang: Lang) -> &'static Set<&'static str> {
    match lang {
        Lang::English => &CATEGORY_NOUNS_EN,
        Lang::Spanish => &CATEGORY_NOUNS_ES,
        Lang::Chinese => &CATEGORY_NOUNS_ZH,
    }
}

pub fn inclusive_conjunctions(lang: Lang) -> &'static [&'static str] {
    match lang {
        Lang::English => INCLUSIVE_CONJUNCTIONS_EN,
        Lang::Spanish => INCLUSIVE_CONJUNCTIONS_ES,
        Lang::Chinese => INCLUSIVE_CONJUNCTIONS_ZH,
    }
}

pub fn binary_idioms(lang: Lang) -> &'static [&'static str] {
    match lang {
        Lang::English => BINARY_IDIOMS_EN,
        Lang::Spanish => BINARY_IDIOMS_ES,
        Lang::Chinese => BINARY_IDIOMS_ZH,
    }
}

pub fn calculation_terms(lang: Lang) -> &'static Set<&'static str> {
    match lang {
        Lang::English => &CALCULATION_TERMS_EN,
        Lang::Spanish => &CALCULATION_TERMS_ES,
        Lang::Chinese => &CALCULATION_TERMS_ZH,
    }
}

pub fn synonym_groups(lang: Lang) -> &'static [&'static [&'static str]] {
    match lang {
        Lang::English => SYNONYM_GROUPS_EN,
        Lang::Spanish => SYNONYM_GROUPS_ES,
        Lang::Chinese => SYNONYM_GROUPS_ZH,
    }
}

pub fn formula_ask_patterns(lang: Lang) -> &'static [&'static str] {
    match lang {
        Lang::English => FORMULA_ASK_PATTERNS_EN,
        Lang::Spanish => FORMULA_ASK_PATTERNS_ES,
        Lang::Chinese => FORMULA_ASK_PATTERNS_ZH,
    }
}

pub fn admin_patterns(lang: Lang) -> &'static [&'static str] {
    match lang {
        Lang::English => ADMIN_PATTERNS_EN,
        Lang::Spanish => ADMIN_PATTERNS_ES,
        Lang::Chinese => ADMIN_PATTERNS_ZH,
    }
}

pub fn admin_keywords(lang: Lang) -> &'static Set<&'static str> {
    match lang {
        Lang::English => &ADMIN_KEYWORDS_EN,
        Lang::Spanish => &ADMIN_KEYWORDS_ES,
        Lang::Chinese => &ADMIN_KEYWORDS_ZH,
    }
}

pub fn stopwords(lang: Lang) -> &'static Set<&'static str> {
    match lang {
        Lang::English => &STOPWORDS_EN,
        Lang::Spanish => &STOPWORDS_ES,
        Lang::Chinese => &STOPWORDS_ZH,
    }
}

/// 文本（已小写）是否包含集合中任意关键词
///
/// 关键词可能是词组或 CJK 片段，统一用子串匹配。
pub fn contains_any(text_lower: &str, set: &Set<&'static str>) -> Option<&'static str> {
    set.iter().find(|kw| text_lower.contains(*kw)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_nonempty_for_all_langs() {
        for lang in [Lang::English, Lang::Spanish, Lang::Chinese] {
            assert!(!vague_interrogatives(lang).is_empty());
            assert!(!qualifiers(lang).is_empty());
            assert!(!category_nouns(lang).is_empty());
            assert!(!admin_keywords(lang).is_empty());
            assert!(!stopwords(lang).is_empty());
            assert!(!synonym_groups(lang).is_empty());
        }
    }

    #[test]
    fn test_contains_any_phrase_match() {
        let hit = contains_any("when is the final exam scheduled", &ADMIN_KEYWORDS_EN);
        assert_eq!(hit, Some("final exam"));
    }

    #[test]
    fn test_contains_any_miss() {
        assert_eq!(contains_any("the merger wave of 1990s", &ADMIN_KEYWORDS_EN), None);
    }
}
