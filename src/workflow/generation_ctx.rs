use crate::models::Lang;

/// 一个章节处理任务的上下文
///
/// 封装流程各环节都要用到的标识信息, 避免参数在调用链里散落。
#[derive(Debug, Clone)]
pub struct GenerationCtx {
    /// 章节序号（从 0 开始, 用于日志和去重记录）
    pub chapter_index: usize,
    /// 章节标题
    pub chapter_title: String,
    /// 内容语言
    pub lang: Lang,
}

impl GenerationCtx {
    /// 创建新的上下文
    pub fn new(chapter_index: usize, chapter_title: impl Into<String>, lang: Lang) -> Self {
        Self {
            chapter_index,
            chapter_title: chapter_title.into(),
            lang,
        }
    }
}
