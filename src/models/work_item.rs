use std::fmt::Display;

/// 一个待处理的条目（模块、教师行）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// 在列表中的位置（从 0 开始）
    pub index: usize,
    /// 界面上的原始文本
    pub raw_label: String,
    /// 清洗后的文件名
    pub name: String,
}

impl WorkItem {
    pub fn new(index: usize, raw_label: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            raw_label: raw_label.into(),
            name: name.into(),
        }
    }
}

impl Display for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[条目 #{} {}]", self.index + 1, self.raw_label)
    }
}

/// 当前可见结果页的状态，只用于判断翻页后内容是否变化
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageState {
    pub fingerprint: String,
    pub item_count: usize,
}
