//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `app` - 应用生命周期
//! - 初始化运行记录、产物目录、浏览器和登录会话
//! - 操作员循环：输入分面 → 处理 → 询问是否继续
//! - 输出全局统计信息
//!
//! ### `harvest` - 单个分面处理器
//! - 枚举分面下的条目（Vec<WorkItem>）
//! - 对每个条目运行 FlowDriver，失败只跳过
//! - 每个条目结束后返回列表
//!
//! ## 层次关系
//!
//! ```text
//! app (操作员循环，处理多个分面)
//!     ↓
//! harvest (处理 Vec<WorkItem>)
//!     ↓
//! workflow::FlowDriver (处理单个 WorkItem)
//!     ↓
//! services (能力层：enumerate / completion / placer / retry / session)
//!     ↓
//! infrastructure (基础设施：Portal、DropDirectory、Operator)
//! ```

pub mod app;
pub mod harvest;

// 重新导出主要类型
pub use app::App;
pub use harvest::{harvest_facet, HarvestStats};
