use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::models::ChapterMeta;

/// 一份待处理的课程源文档
///
/// 正文来自上游抽取好的纯文本文件；同名 `.toml` 侧车文件（可选）
/// 携带上游产出的章节元数据。
#[derive(Debug, Clone)]
pub struct CourseDocument {
    /// 文档名（文件名去扩展名）
    pub name: String,
    /// 抽取后的全文
    pub text: String,
    /// 上游给出的章节元数据（缺失时由兜底服务等分）
    pub chapters: Option<Vec<ChapterMeta>>,
}

#[derive(Debug, Deserialize)]
struct ChapterMetaFile {
    chapters: Vec<ChapterMeta>,
}

/// 从 TOML 侧车文件加载章节元数据
pub async fn load_chapter_metas(toml_file_path: &Path) -> Result<Vec<ChapterMeta>> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let file: ChapterMetaFile = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    Ok(file.chapters)
}

/// 从文件夹中加载所有课程源文档
///
/// 扫描 `.txt` / `.md` 文件作为正文, 同名 `.toml` 作为章节元数据侧车。
pub async fn load_course_documents(folder_path: &str) -> Result<Vec<CourseDocument>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut documents = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let ext = path.extension().and_then(|s| s.to_str());
        if !matches!(ext, Some("txt") | Some("md")) {
            continue;
        }

        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        let text = match fs::read_to_string(&path).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {}", path.display(), e);
                continue;
            }
        };

        // 同名 .toml 侧车（可选）
        let sidecar = path.with_extension("toml");
        let chapters = if sidecar.exists() {
            match load_chapter_metas(&sidecar).await {
                Ok(metas) => {
                    tracing::info!("成功加载 {} 个章节元数据", metas.len());
                    Some(metas)
                }
                Err(e) => {
                    tracing::warn!("章节元数据解析失败 {}: {}", sidecar.display(), e);
                    None
                }
            }
        } else {
            None
        };

        let name = path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        documents.push(CourseDocument {
            name,
            text,
            chapters,
        });
    }

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_meta_file_parse() {
        let toml_src = r#"
            [[chapters]]
            title = "资本结构"
            summary = "风险与收益的分配"
            key_concepts = ["杠杆", "破产成本"]

            [[chapters]]
            title = "并购浪潮"
        "#;
        let file: ChapterMetaFile = toml::from_str(toml_src).expect("解析失败");
        assert_eq!(file.chapters.len(), 2);
        assert_eq!(file.chapters[0].title, "资本结构");
        assert_eq!(file.chapters[0].key_concepts.len(), 2);
        assert!(file.chapters[1].summary.is_none());
    }
}
