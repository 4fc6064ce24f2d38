//! # Portal Harvest
//!
//! 从需要登录、重度依赖 JavaScript 的门户中批量导出资料（题库 PDF、课程资料 ZIP）
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page、投放目录、标准输入），只暴露能力
//! - `Portal` - 浏览器能力 trait，`CdpPortal` 是唯一的 page owner
//! - `DropDirectory` - 投放目录列表
//! - `Operator` - 操作员问答
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个条目
//! - `SessionManager` - 登录状态的加载与保存
//! - `facet_enumerator` - 列出分面下的条目
//! - `ContentChange` / `FileArrival` - 异步完成检测
//! - `ArtifactPlacer` - 安全命名与无冲突放置
//! - `RetryPolicy` - 有上限的就绪等待 + 一次兜底点击
//! - `SkipWriter` - 写跳过记录
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个条目"的完整处理流程
//! - `HarvestCtx` - 上下文封装（分面 + 条目）
//! - `FlowDriver` - 状态机（选中 → 选项 → 结果 → 翻页 → 导出 → 放置）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 应用生命周期与操作员循环
//! - `orchestrator/harvest` - 单个分面处理器，遍历条目列表
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, Timeouts};
pub use error::{AppError, AppResult, FlowError, FlowResult};
pub use infrastructure::{CdpPortal, Locator, Portal};
pub use models::{PortalProfile, UiRole, WorkItem};
pub use orchestrator::{harvest_facet, App};
pub use workflow::{FlowDriver, FlowReport, FlowState, HarvestCtx};
