//! 门户配置
//!
//! 一个门户的全部差异都在这里：入口、流程开关、产物判定规则、定位器表。

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult, ConfigError};
use crate::infrastructure::Locator;
use crate::models::locators::{LocatorTable, UiRole};

/// 产物落地判定规则
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrivalRule {
    /// 产物扩展名（不带点）
    pub extension: String,
    /// 下载中的临时后缀
    #[serde(default = "default_in_progress_suffixes")]
    pub in_progress_suffixes: Vec<String>,
    /// 是否要求两次轮询之间文件大小不变
    #[serde(default = "default_true")]
    pub require_stable_size: bool,
}

impl ArrivalRule {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            in_progress_suffixes: default_in_progress_suffixes(),
            require_stable_size: true,
        }
    }

    /// 文件名是否带扩展名（大小写不敏感）
    pub fn matches_extension(&self, name: &str) -> bool {
        let suffix = format!(".{}", self.extension.to_lowercase());
        name.to_lowercase().ends_with(&suffix)
    }

    /// 文件名本身是否带下载中后缀
    pub fn is_in_progress_name(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.in_progress_suffixes
            .iter()
            .any(|s| lower.ends_with(&s.to_lowercase()))
    }
}

fn default_in_progress_suffixes() -> Vec<String> {
    vec![
        ".crdownload".to_string(),
        ".partial".to_string(),
        ".part".to_string(),
        ".tmp".to_string(),
    ]
}

fn default_true() -> bool {
    true
}

/// 门户配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalProfile {
    pub name: String,
    /// 入口 URL
    pub entry_url: String,
    /// 是否把登录状态保存到磁盘
    #[serde(default)]
    pub persist_session: bool,
    /// 是否需要操作员输入父级分面（学科）并按文本选择
    #[serde(default)]
    pub parent_facet: bool,
    /// 每个条目开始前是否重新打开入口并重选父级分面
    #[serde(default)]
    pub reload_per_item: bool,
    /// 翻页前是否勾选当前页所有子项
    #[serde(default)]
    pub select_sub_items: bool,
    /// 从第一条结果中提取指纹的正则（取第一个捕获组）
    #[serde(default)]
    pub fingerprint_pattern: Option<String>,
    pub arrival: ArrivalRule,
    pub locators: LocatorTable,
}

impl PortalProfile {
    /// 按名称取内置配置
    pub fn builtin(name: &str) -> AppResult<Self> {
        match name {
            "question-bank" => Ok(Self::question_bank()),
            "course-archive" => Ok(Self::course_archive()),
            other => Err(AppError::Config(ConfigError::UnknownProfile {
                name: other.to_string(),
            })),
        }
    }

    /// 题库：学科 → 模块 → 勾选所有题目 → 导出 PDF
    pub fn question_bank() -> Self {
        const ASIDE: &str = "/html/body/div[1]/main/div/div/div/aside";
        const PAGINATION: &str =
            "main[role='main'] div.flex-shrink-0.p-4.border-t div.flex.justify-center.items-center";

        let locators = LocatorTable::new()
            .with(UiRole::FacetPicker, Locator::xpath(format!("{ASIDE}/div[2]/form/div[1]/div/button")))
            .with(UiRole::WorkItem, Locator::xpath(format!("{ASIDE}/div[2]/form/div[2]/div/button")))
            .with(UiRole::OptionToggle, Locator::xpath(format!("{ASIDE}/div[2]/form/div[4]/label/div")))
            .with(UiRole::GenerateButton, Locator::xpath(format!("{ASIDE}/div[2]/form/button")))
            .with(UiRole::ResultItem, Locator::css("main[role='main'] div.mb-4.rounded-lg"))
            .with(
                UiRole::SelectableItem,
                Locator::css("div.checkboxContainer input[name='selected_questions']"),
            )
            .with(UiRole::AdvanceButton, Locator::css(format!("{PAGINATION} > button:last-child")))
            .with(UiRole::ExportButton, Locator::xpath(format!("{ASIDE}/div[3]/button")));

        Self {
            name: "question-bank".to_string(),
            entry_url: "https://unibud.in/VITQuestionBank".to_string(),
            persist_session: true,
            parent_facet: true,
            reload_per_item: true,
            select_sub_items: true,
            fingerprint_pattern: Some(r"Question ID:\s*(\d+)".to_string()),
            arrival: ArrivalRule::new("pdf"),
            locators,
        }
    }

    /// 课程资料：教师行 → 详情 → 下载全部资料 ZIP → 返回
    pub fn course_archive() -> Self {
        const FACULTY_TABLE: &str = r#"//*[@id="getFacultyForCoursePage"]/div[2]/table/tbody"#;
        const DETAIL_TABLE: &str = r#"//*[@id="CoursePageLectureDetail"]/div[2]/div/table/tbody"#;

        let rows = Locator::xpath(format!("{FACULTY_TABLE}/tr"));
        let locators = LocatorTable::new()
            .with(UiRole::FacetHeaderCode, Locator::xpath(format!("{FACULTY_TABLE}/tr[2]/td[3]")))
            .with(UiRole::FacetHeaderTitle, Locator::xpath(format!("{FACULTY_TABLE}/tr[2]/td[4]")))
            .with(UiRole::WorkItemTrigger, Locator::scoped(rows.clone(), Locator::xpath(".//td[9]/button")))
            .with(UiRole::WorkItem, rows)
            .with(UiRole::ItemDetail, Locator::xpath(format!("{DETAIL_TABLE}/tr[2]/td[7]")))
            .with(UiRole::DetailName, Locator::xpath(format!("{DETAIL_TABLE}/tr[2]/td[7]")))
            .with(UiRole::DetailSlot, Locator::xpath(format!("{DETAIL_TABLE}/tr[2]/td[6]")))
            .with(UiRole::ExportButton, Locator::xpath(r#"//*[@id="allMaterialDownload"]"#))
            .with(UiRole::BackButton, Locator::xpath(r#"//*[@id="backButton"]"#));

        Self {
            name: "course-archive".to_string(),
            entry_url: "https://vtop.vit.ac.in".to_string(),
            persist_session: false,
            parent_facet: false,
            reload_per_item: false,
            select_sub_items: false,
            fingerprint_pattern: None,
            arrival: ArrivalRule::new("zip"),
            locators,
        }
    }
}
