//! 投放目录 - 基础设施层
//!
//! 浏览器把导出的文件写进这个共享目录，这里只负责列出当前有哪些文件、各多大。

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{FlowError, FlowResult};

/// 投放目录
#[derive(Debug, Clone)]
pub struct DropDirectory {
    path: PathBuf,
}

impl DropDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 确保目录存在
    pub async fn ensure(&self) -> FlowResult<()> {
        fs::create_dir_all(&self.path)
            .await
            .map_err(|e| FlowError::io(&self.path, e))
    }

    /// 当前所有文件名与大小（按文件名排序）
    ///
    /// 列表与读取元数据之间文件被改名/删除时返回 `StaleReference`
    pub async fn listing(&self) -> FlowResult<BTreeMap<String, u64>> {
        let mut entries = fs::read_dir(&self.path)
            .await
            .map_err(|e| FlowError::io(&self.path, e))?;

        let mut files = BTreeMap::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FlowError::io(&self.path, e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(FlowError::stale(format!("投放目录中的 {}", name)));
                }
                Err(e) => return Err(FlowError::io(entry.path(), e)),
            };
            if metadata.is_file() {
                files.insert(name, metadata.len());
            }
        }
        Ok(files)
    }

    /// 记录当前文件名作为基线
    pub async fn snapshot(&self) -> FlowResult<HashSet<String>> {
        Ok(self.listing().await?.into_keys().collect())
    }
}
