//! 单个条目的流程状态

use std::fmt::Display;
use std::path::PathBuf;

use crate::error::FlowResult;
use crate::services::PlacedArtifact;

/// 流程状态
///
/// `Start → FacetSelected → OptionsApplied → ResultsLoaded → Paginating → Completed
/// → ArtifactRequested → Done`，任何状态都可能进入 `Error`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Start,
    FacetSelected,
    OptionsApplied,
    ResultsLoaded,
    /// 正在处理第 `page` 页（从 1 开始）
    Paginating { page: usize },
    /// 翻页结束，共处理 `pages` 页
    Completed { pages: usize },
    /// 产物已在投放目录中落地
    ArtifactRequested { source: PathBuf },
    Done(PlacedArtifact),
    /// 失败原因（完整错误见 [`FlowReport::outcome`]）
    Error(String),
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Done(_) | FlowState::Error(_))
    }
}

impl Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowState::Start => write!(f, "开始"),
            FlowState::FacetSelected => write!(f, "已选中条目"),
            FlowState::OptionsApplied => write!(f, "已应用选项"),
            FlowState::ResultsLoaded => write!(f, "结果已加载"),
            FlowState::Paginating { page } => write!(f, "第 {} 页", page),
            FlowState::Completed { pages } => write!(f, "翻页完成 ({} 页)", pages),
            FlowState::ArtifactRequested { source } => {
                write!(f, "产物已落地: {}", source.display())
            }
            FlowState::Done(placed) => write!(f, "完成: {}", placed.destination.display()),
            FlowState::Error(reason) => write!(f, "失败: {}", reason),
        }
    }
}

/// 一个条目的流程记录
#[derive(Debug)]
pub struct FlowReport {
    /// 依次经过的状态（含 `Start` 和终态）
    pub visited: Vec<FlowState>,
    pub outcome: FlowResult<PlacedArtifact>,
}

impl FlowReport {
    /// 是否进入过条目详情（选中条目成功）
    pub fn entered_item(&self) -> bool {
        self.visited.contains(&FlowState::FacetSelected)
    }

    /// 经过的页数（没有进入翻页时为 0）
    pub fn pages(&self) -> usize {
        self.visited
            .iter()
            .filter_map(|s| match s {
                FlowState::Completed { pages } => Some(*pages),
                _ => None,
            })
            .last()
            .unwrap_or(0)
    }
}
