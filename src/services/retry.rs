//! 界面动作重试策略 - 业务能力层
//!
//! 每个动作：有上限地等待控件就绪 → 原生调用 → 失败时恰好一次脚本兜底。

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{FlowError, FlowResult};
use crate::infrastructure::{ElementState, Locator, Portal};
use crate::services::completion::poll_until;

/// 界面动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    Click,
    /// 勾选；已勾选时什么也不做
    Check,
}

/// 动作执行结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    Primary,
    Fallback,
    /// 已经是目标状态（例如复选框已勾选）
    AlreadyDone,
}

/// 重试策略
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// 等待控件就绪的上限
    pub ready_timeout: Duration,
    /// 就绪轮询间隔
    pub poll_interval: Duration,
}

impl RetryPolicy {
    pub fn new(ready_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            ready_timeout,
            poll_interval,
        }
    }

    pub fn with_timeout(self, ready_timeout: Duration) -> Self {
        Self {
            ready_timeout,
            ..self
        }
    }

    /// 等待控件出现；在上限内出现但未就绪时返回它最后的状态
    async fn wait_ready(&self, portal: &dyn Portal, locator: &Locator, nth: usize, what: &str) -> FlowResult<ElementState> {
        let last = std::sync::Mutex::new(ElementState::absent());
        let last_ref = &last;
        let waited = poll_until(what, self.poll_interval, self.ready_timeout, move || async move {
            let state = portal.probe(locator, nth).await?;
            *last_ref.lock().unwrap_or_else(|e| e.into_inner()) = state;
            Ok(state.is_ready().then_some(state))
        })
        .await;

        match waited {
            Ok(state) => Ok(state),
            Err(FlowError::Timeout { .. }) => {
                let state = *last.lock().unwrap_or_else(|e| e.into_inner());
                if state.present {
                    Ok(state)
                } else {
                    Err(FlowError::not_found(what))
                }
            }
            Err(e) => Err(e),
        }
    }

    /// 执行一次界面动作
    pub async fn invoke(
        &self,
        portal: &dyn Portal,
        locator: &Locator,
        nth: usize,
        action: UiAction,
        what: &str,
    ) -> FlowResult<Invocation> {
        let state = self.wait_ready(portal, locator, nth, what).await?;

        if action == UiAction::Check && state.checked {
            return Ok(Invocation::AlreadyDone);
        }

        if state.is_ready() {
            match portal.click(locator, nth).await {
                Ok(()) => return Ok(Invocation::Primary),
                Err(FlowError::SessionLost(reason)) => return Err(FlowError::SessionLost(reason)),
                Err(e) => warn!("⚠️ 点击{}失败 ({})，改用脚本点击", what, e),
            }
        } else {
            debug!("{} 在 {:?} 内未就绪，直接使用脚本点击", what, self.ready_timeout);
        }

        portal.force_click(locator, nth).await?;
        Ok(Invocation::Fallback)
    }
}
