//! 跳过记录服务 - 业务能力层
//!
//! 只负责"把跳过的条目追加到运行记录文件"，不关心流程

use anyhow::Result;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::FlowError;
use crate::models::WorkItem;

/// 跳过记录服务
///
/// 每个跳过的条目一行：时间 | 分面 | 条目 | 原因
pub struct SkipWriter {
    transcript_path: String,
}

impl SkipWriter {
    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            transcript_path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.transcript_path
    }

    /// 追加一条跳过记录
    pub async fn write(&self, facet: &str, item: &WorkItem, reason: &FlowError) -> Result<()> {
        debug!("写入跳过记录: {} {}", facet, item);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.transcript_path)
            .await?;

        let line = format!(
            "{} | 分面 {} | 条目 #{} {} | 原因: {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            facet,
            item.index + 1,
            item.raw_label,
            reason
        );

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
