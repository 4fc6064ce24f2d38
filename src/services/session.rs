//! 登录会话管理 - 业务能力层
//!
//! 首次运行由操作员手动登录，之后从磁盘加载登录状态

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{info, warn};

use crate::error::{AppError, FileError};
use crate::infrastructure::{Operator, Portal, SessionState};

/// 会话是怎么得到的
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    /// 从磁盘加载
    Restored,
    /// 操作员手动登录后保存
    Bootstrapped,
    /// 操作员手动登录，不保存
    Interactive,
}

/// 已登录的浏览上下文，整个运行期间只有一个
pub struct Session {
    portal: Arc<dyn Portal>,
    origin: SessionOrigin,
}

impl Session {
    pub fn portal(&self) -> Arc<dyn Portal> {
        Arc::clone(&self.portal)
    }

    pub fn origin(&self) -> SessionOrigin {
        self.origin
    }

    /// 退出时释放会话；浏览器进程由 App 关闭
    pub fn close(self) {
        info!("会话已关闭 ({:?})", self.origin);
    }
}

/// 会话管理器
pub struct SessionManager {
    state_path: Option<PathBuf>,
    entry_url: String,
}

impl SessionManager {
    /// `state_path` 为 `None` 时每次都需要操作员登录，且不保存
    pub fn new(state_path: Option<PathBuf>, entry_url: impl Into<String>) -> Self {
        Self {
            state_path,
            entry_url: entry_url.into(),
        }
    }

    /// 获取会话：有保存的状态就加载，否则让操作员登录
    pub async fn acquire(&self, portal: Arc<dyn Portal>, operator: &dyn Operator) -> Result<Session> {
        let Some(path) = self.state_path.as_deref() else {
            self.open_entry(portal.as_ref()).await?;
            operator
                .confirm("请在浏览器中登录并打开目标页面，完成后")
                .await?;
            return Ok(Session {
                portal,
                origin: SessionOrigin::Interactive,
            });
        };

        if fs::try_exists(path).await.unwrap_or(false) {
            match read_state(path).await {
                Ok(state) => {
                    portal.import_state(&state).await?;
                    self.open_entry(portal.as_ref()).await?;
                    info!(
                        "✓ 已加载登录状态: {} (保存于 {})",
                        path.display(),
                        state.saved_at.format("%Y-%m-%d %H:%M:%S")
                    );
                    return Ok(Session {
                        portal,
                        origin: SessionOrigin::Restored,
                    });
                }
                Err(e) => warn!("⚠️ 登录状态文件不可用，重新登录: {:#}", e),
            }
        }

        self.open_entry(portal.as_ref()).await?;
        operator.confirm("请在浏览器中完成登录，完成后").await?;

        let state = portal.export_state().await?;
        write_state(path, &state).await?;
        info!(
            "✓ 登录状态已保存: {} ({} 个 cookie)",
            path.display(),
            state.cookies.len()
        );

        Ok(Session {
            portal,
            origin: SessionOrigin::Bootstrapped,
        })
    }

    async fn open_entry(&self, portal: &dyn Portal) -> Result<()> {
        portal
            .goto(&self.entry_url)
            .await
            .with_context(|| format!("无法打开入口页面: {}", self.entry_url))?;
        Ok(())
    }
}

async fn read_state(path: &Path) -> Result<SessionState> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
    let state = serde_json::from_str(&content).map_err(|e| {
        AppError::File(FileError::JsonParseFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })
    })?;
    Ok(state)
}

async fn write_state(path: &Path, state: &SessionState) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::create_dir_failed(parent.display().to_string(), e))?;
    }
    let json = serde_json::to_string_pretty(state)?;
    fs::write(path, json)
        .await
        .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
    Ok(())
}
