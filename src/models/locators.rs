//! 界面角色 → 定位器 映射表
//!
//! 流程层只认识角色（"翻页按钮"、"导出按钮"），具体选择器由门户配置注入。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, FlowResult};
use crate::infrastructure::Locator;

/// 界面上的逻辑角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiRole {
    /// 打开父级分面（学科）选择器的按钮
    FacetPicker,
    /// 页面头部的课程代码
    FacetHeaderCode,
    /// 页面头部的课程名称
    FacetHeaderTitle,
    /// 条目列表，枚举时读取每一项的文本
    WorkItem,
    /// 选中条目时要点击的控件；未配置时直接点击 WorkItem
    WorkItemTrigger,
    /// 选中条目后应当出现的详情标记
    ItemDetail,
    /// 详情中的名称单元格
    DetailName,
    /// 详情中的时段单元格
    DetailSlot,
    /// 可选开关（尽力而为）
    OptionToggle,
    /// 触发生成/搜索的按钮
    GenerateButton,
    /// 结果列表中的条目，第一项用于提取指纹
    ResultItem,
    /// 结果中可勾选的子项
    SelectableItem,
    /// 翻页按钮
    AdvanceButton,
    /// 导出按钮
    ExportButton,
    /// 返回列表的按钮
    BackButton,
}

impl UiRole {
    pub fn label(self) -> &'static str {
        match self {
            UiRole::FacetPicker => "分面选择器",
            UiRole::FacetHeaderCode => "课程代码",
            UiRole::FacetHeaderTitle => "课程名称",
            UiRole::WorkItem => "条目列表",
            UiRole::WorkItemTrigger => "条目入口",
            UiRole::ItemDetail => "条目详情",
            UiRole::DetailName => "详情名称",
            UiRole::DetailSlot => "详情时段",
            UiRole::OptionToggle => "可选开关",
            UiRole::GenerateButton => "生成按钮",
            UiRole::ResultItem => "结果条目",
            UiRole::SelectableItem => "可勾选子项",
            UiRole::AdvanceButton => "翻页按钮",
            UiRole::ExportButton => "导出按钮",
            UiRole::BackButton => "返回按钮",
        }
    }
}

/// 定位器表
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocatorTable(BTreeMap<UiRole, Locator>);

impl LocatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: UiRole, locator: Locator) -> Self {
        self.0.insert(role, locator);
        self
    }

    pub fn get(&self, role: UiRole) -> Option<&Locator> {
        self.0.get(&role)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 必须存在的角色，缺失时按"控件不存在"处理
    pub fn require(&self, role: UiRole) -> FlowResult<&Locator> {
        self.get(role)
            .ok_or_else(|| FlowError::not_found(format!("定位表中没有配置{}", role.label())))
    }

    /// 选中第 n 个条目要点击的控件
    pub fn item_trigger(&self) -> FlowResult<&Locator> {
        match self.get(UiRole::WorkItemTrigger) {
            Some(locator) => Ok(locator),
            None => self.require(UiRole::WorkItem),
        }
    }
}
