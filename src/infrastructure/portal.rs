//! 门户能力 - 基础设施层
//!
//! 只描述"浏览器能做什么"：打开页面、定位元素、读取状态、点击、导出登录状态。
//! 不认识 WorkItem / 流程状态，流程层只通过这个 trait 操作页面。

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::FlowResult;

/// 元素定位方式
///
/// `Scoped` 先按 `parent` 找到一组元素，再在第 n 个父元素内部找 `child` 的第一个匹配，
/// 下标始终指向父元素（例如"第 n 行里的按钮"）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Locator {
    Css(String),
    Xpath(String),
    /// 包含该文本的最内层元素
    Text(String),
    Scoped {
        parent: Box<Locator>,
        child: Box<Locator>,
    },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::Xpath(expr.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Locator::Text(text.into())
    }

    pub fn scoped(parent: Locator, child: Locator) -> Self {
        Locator::Scoped {
            parent: Box::new(parent),
            child: Box::new(child),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css={}", s),
            Locator::Xpath(s) => write!(f, "xpath={}", s),
            Locator::Text(s) => write!(f, "text={}", s),
            Locator::Scoped { parent, child } => write!(f, "{} >> {}", parent, child),
        }
    }
}

/// 一次查询得到的元素状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ElementState {
    pub present: bool,
    pub visible: bool,
    pub enabled: bool,
    pub checked: bool,
}

impl ElementState {
    pub fn absent() -> Self {
        Self::default()
    }

    /// 可见且可用，可以直接点击
    pub fn is_ready(&self) -> bool {
        self.present && self.visible && self.enabled
    }
}

/// 持久化的登录状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub saved_at: DateTime<Local>,
    #[serde(default)]
    pub cookies: Vec<StoredCookie>,
    /// local storage 所属的源
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub local_storage: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

/// 浏览器能力
///
/// 所有元素操作都按 (定位器, 下标) 寻址，每次调用重新查询，不持有元素句柄。
/// 约定：
/// - 元素不存在 → `FlowError::NotFound`
/// - 元素在查询与操作之间被替换 → `FlowError::StaleReference`
/// - 浏览器断开 → `FlowError::SessionLost`
#[async_trait]
pub trait Portal: Send + Sync {
    /// 打开页面
    async fn goto(&self, url: &str) -> FlowResult<()>;

    /// 当前匹配的元素数量
    async fn count(&self, locator: &Locator) -> FlowResult<usize>;

    /// 查询第 n 个元素的状态，不存在时返回 `ElementState::absent()`
    async fn probe(&self, locator: &Locator, nth: usize) -> FlowResult<ElementState>;

    /// 第 n 个元素的可见文本
    async fn text(&self, locator: &Locator, nth: usize) -> FlowResult<String>;

    /// 原生点击（鼠标事件）
    async fn click(&self, locator: &Locator, nth: usize) -> FlowResult<()>;

    /// 脚本点击，原生点击失败时的兜底
    async fn force_click(&self, locator: &Locator, nth: usize) -> FlowResult<()>;

    /// 滚动到视图中央
    async fn scroll_into_view(&self, locator: &Locator, nth: usize) -> FlowResult<()>;

    /// 导出当前登录状态
    async fn export_state(&self) -> FlowResult<SessionState>;

    /// 导入登录状态
    async fn import_state(&self, state: &SessionState) -> FlowResult<()>;
}
