//! 条目处理上下文
//!
//! 封装"我正在处理哪个分面的第几个条目"这一信息

use std::fmt::Display;
use std::path::PathBuf;

use crate::models::WorkItem;

/// 条目处理上下文
#[derive(Debug, Clone)]
pub struct HarvestCtx {
    /// 操作员输入的分面名（课程资料门户为空）
    pub facet: String,

    /// 本分面产物的存放目录
    pub facet_dir: PathBuf,

    /// 当前条目；名称在选中后可能被详情信息修正
    pub item: WorkItem,
}

impl HarvestCtx {
    pub fn new(facet: impl Into<String>, facet_dir: impl Into<PathBuf>, item: WorkItem) -> Self {
        Self {
            facet: facet.into(),
            facet_dir: facet_dir.into(),
            item,
        }
    }
}

impl Display for HarvestCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.facet.is_empty() {
            write!(f, "[条目 #{} {}]", self.item.index + 1, self.item.name)
        } else {
            write!(
                f,
                "[{} 条目 #{} {}]",
                self.facet,
                self.item.index + 1,
                self.item.name
            )
        }
    }
}
