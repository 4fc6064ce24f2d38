//! 产物命名与放置 - 业务能力层
//!
//! 只负责"给产物起一个安全的名字并挪到目标目录"，不关心产物怎么来的

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{FlowError, FlowResult};

/// 清洗后为空时使用的名字
pub const PLACEHOLDER_NAME: &str = "Item";

/// 路径中不允许出现的字符
fn is_illegal(c: char) -> bool {
    matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control()
}

/// 生成文件系统安全的名字
///
/// - 连续的非法字符替换为一个 `_`
/// - 连续空白压缩为一个空格
/// - 去掉首尾的空白和点
/// - 结果为空时返回 [`PLACEHOLDER_NAME`]
pub fn sanitize(label: &str) -> String {
    let mut replaced = String::with_capacity(label.len());
    let mut in_illegal_run = false;
    for c in label.chars() {
        // 换行、制表符等控制字符当作空白处理
        if c.is_whitespace() {
            in_illegal_run = false;
            replaced.push(' ');
        } else if is_illegal(c) {
            if !in_illegal_run {
                replaced.push('_');
            }
            in_illegal_run = true;
        } else {
            in_illegal_run = false;
            replaced.push(c);
        }
    }

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c: char| c == '.' || c.is_whitespace());

    if trimmed.is_empty() {
        PLACEHOLDER_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// 已放置的产物
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedArtifact {
    /// 投放目录中的原始路径（放置后已不存在）
    pub source: PathBuf,
    /// 最终路径
    pub destination: PathBuf,
    /// 是否因重名追加了序号
    pub renamed_on_conflict: bool,
}

/// 产物放置服务
#[derive(Debug, Default, Clone)]
pub struct ArtifactPlacer;

impl ArtifactPlacer {
    pub fn new() -> Self {
        Self
    }

    /// 第一个未被占用的路径：`stem.ext`、`stem_1.ext`、`stem_2.ext` …
    ///
    /// 无法判断路径是否存在时返回错误，不再继续试探下一个序号。
    pub async fn free_path(
        &self,
        dest_dir: &Path,
        stem: &str,
        extension: Option<&str>,
    ) -> FlowResult<PathBuf> {
        let file_name = |suffix: Option<usize>| {
            let base = match suffix {
                Some(n) => format!("{}_{}", stem, n),
                None => stem.to_string(),
            };
            match extension {
                Some(ext) if !ext.is_empty() => format!("{}.{}", base, ext),
                _ => base,
            }
        };

        let mut candidate = dest_dir.join(file_name(None));
        let mut counter = 1;
        while fs::try_exists(&candidate)
            .await
            .map_err(|e| FlowError::io(&candidate, e))?
        {
            candidate = dest_dir.join(file_name(Some(counter)));
            counter += 1;
        }
        Ok(candidate)
    }

    /// 把产物挪到目标目录，重名时追加序号
    ///
    /// 优先原子 rename；跨设备等失败时退化为复制后删除。成功后源文件一定不存在。
    pub async fn place(&self, source: &Path, dest_dir: &Path, stem: &str) -> FlowResult<PlacedArtifact> {
        fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| FlowError::io(dest_dir, e))?;

        let stem = sanitize(stem);
        let extension = source.extension().and_then(|e| e.to_str());
        let destination = self.free_path(dest_dir, &stem, extension).await?;
        let preferred = match extension {
            Some(ext) => dest_dir.join(format!("{}.{}", stem, ext)),
            None => dest_dir.join(&stem),
        };
        let renamed_on_conflict = destination != preferred;
        if renamed_on_conflict {
            debug!("目标已存在，改用: {}", destination.display());
        }

        if let Err(rename_err) = fs::rename(source, &destination).await {
            warn!(
                "⚠️ 无法直接移动 {} ({})，改为复制后删除",
                source.display(),
                rename_err
            );
            fs::copy(source, &destination)
                .await
                .map_err(|e| FlowError::io(&destination, e))?;
            fs::remove_file(source)
                .await
                .map_err(|e| FlowError::io(source, e))?;
        }

        info!("✓ 已保存: {}", destination.display());
        Ok(PlacedArtifact {
            source: source.to_path_buf(),
            destination,
            renamed_on_conflict,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_illegal_characters() {
        assert_eq!(sanitize("A/B:C"), "A_B_C");
        assert_eq!(sanitize("a<>|b"), "a_b");
        assert_eq!(sanitize("  Module   2  "), "Module 2");
        assert_eq!(sanitize("Line\nbreak\tname"), "Line break name");
    }

    #[test]
    fn sanitize_uses_placeholder_for_empty() {
        assert_eq!(sanitize("  "), PLACEHOLDER_NAME);
        assert_eq!(sanitize(""), PLACEHOLDER_NAME);
        assert_eq!(sanitize(" . . "), PLACEHOLDER_NAME);
    }

    #[test]
    fn sanitize_is_idempotent() {
        let samples = [
            "A/B:C",
            "  ",
            "a .",
            "Dr. X - Slot A1+TA1",
            "..hidden..",
            "tab\there",
            "__/__",
            "中文 模块 1",
        ];
        for s in samples {
            let once = sanitize(s);
            assert_eq!(sanitize(&once), once, "input: {:?}", s);
        }
    }

    #[tokio::test]
    async fn place_appends_numeric_suffix_on_collision() {
        let drop = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let placer = ArtifactPlacer::new();

        let mut placed = Vec::new();
        for i in 0..3 {
            let src = drop.path().join(format!("download-{}.pdf", i));
            std::fs::write(&src, format!("content {}", i)).unwrap();
            placed.push(placer.place(&src, dest.path(), "Module").await.unwrap());
            assert!(!src.exists());
        }

        let names: Vec<_> = placed
            .iter()
            .map(|p| p.destination.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["Module.pdf", "Module_1.pdf", "Module_2.pdf"]);
        assert!(!placed[0].renamed_on_conflict);
        assert!(placed[2].renamed_on_conflict);
        assert_eq!(
            std::fs::read_to_string(dest.path().join("Module.pdf")).unwrap(),
            "content 0"
        );
    }

    #[tokio::test]
    async fn free_path_reports_unsearchable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("plain.txt");
        std::fs::write(&not_a_dir, b"x").unwrap();

        let err = ArtifactPlacer::new()
            .free_path(&not_a_dir, "Module", Some("zip"))
            .await
            .unwrap_err();

        match err {
            FlowError::Io { path, .. } => assert_eq!(path, not_a_dir.join("Module.zip")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn place_creates_destination_directory() {
        let drop = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let nested = dest.path().join("CSE1001 Programming");
        let src = drop.path().join("all.zip");
        std::fs::write(&src, b"zip").unwrap();

        let placed = ArtifactPlacer::new()
            .place(&src, &nested, "Dr. X: A1")
            .await
            .unwrap();

        assert_eq!(placed.destination, nested.join("Dr. X_ A1.zip"));
        assert!(placed.destination.exists());
    }
}
