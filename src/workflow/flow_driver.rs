//! 条目处理流程 - 流程层
//!
//! 核心职责：驱动"一个条目"从选中到产物落地的完整流程
//!
//! 流程顺序：
//! 1. 选中条目（必要时重新打开入口并重选分面）
//! 2. 可选开关（尽力而为）
//! 3. 生成结果并等待第一条结果
//! 4. 逐页勾选并翻页，直到翻页按钮消失或不可用
//! 5. 导出并等待文件落地
//! 6. 重命名放入分面目录

use std::sync::Arc;

use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::config::Timeouts;
use crate::error::{AppError, AppResult, ConfigError, FlowError, FlowResult};
use crate::infrastructure::{DropDirectory, Locator, Portal};
use crate::models::{PageState, PortalProfile, UiRole};
use crate::services::completion::{poll_until, ContentChange, FileArrival};
use crate::services::facet_enumerator::select_parent_facet;
use crate::services::retry::{RetryPolicy, UiAction};
use crate::services::{sanitize, ArtifactPlacer};
use crate::workflow::flow_state::{FlowReport, FlowState};
use crate::workflow::harvest_ctx::HarvestCtx;

/// 条目处理流程
///
/// - 每个状态转换是一个独立的 async 函数
/// - 只通过 `Portal` 操作页面，选择器全部来自门户配置
/// - 同一个实例在整个运行期间复用（已认领的产物不会被第二次认领）
pub struct FlowDriver {
    portal: Arc<dyn Portal>,
    profile: PortalProfile,
    timeouts: Timeouts,
    retry: RetryPolicy,
    fingerprint: Option<Regex>,
    arrival: FileArrival,
    placer: ArtifactPlacer,
}

impl FlowDriver {
    pub fn new(
        portal: Arc<dyn Portal>,
        profile: PortalProfile,
        timeouts: Timeouts,
        drop_dir: DropDirectory,
    ) -> AppResult<Self> {
        let fingerprint = profile
            .fingerprint_pattern
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| {
                    AppError::Config(ConfigError::InvalidFingerprintPattern {
                        pattern: pattern.to_string(),
                        source,
                    })
                })
            })
            .transpose()?;

        Ok(Self {
            arrival: FileArrival::new(drop_dir, profile.arrival.clone()),
            retry: RetryPolicy::new(timeouts.element, timeouts.poll_interval),
            placer: ArtifactPlacer::new(),
            portal,
            profile,
            timeouts,
            fingerprint,
        })
    }

    pub fn portal(&self) -> &dyn Portal {
        self.portal.as_ref()
    }

    pub fn profile(&self) -> &PortalProfile {
        &self.profile
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// 跑完一个条目的流程，记录经过的所有状态
    pub async fn run(&mut self, ctx: &mut HarvestCtx) -> FlowReport {
        let mut state = FlowState::Start;
        let mut visited = vec![state.clone()];

        loop {
            let next = match state {
                FlowState::Done(placed) => {
                    return FlowReport {
                        visited,
                        outcome: Ok(placed),
                    }
                }
                current => self.step(ctx, current).await,
            };

            match next {
                Ok(next) => {
                    debug!("{} → {}", ctx, next);
                    visited.push(next.clone());
                    state = next;
                }
                Err(e) => {
                    error!("{} ❌ {}", ctx, e);
                    visited.push(FlowState::Error(e.to_string()));
                    return FlowReport {
                        visited,
                        outcome: Err(e),
                    };
                }
            }
        }
    }

    /// 执行一次状态转换
    pub async fn step(&mut self, ctx: &mut HarvestCtx, state: FlowState) -> FlowResult<FlowState> {
        match state {
            FlowState::Start => self.select_item(ctx).await,
            FlowState::FacetSelected => self.apply_options(ctx).await,
            FlowState::OptionsApplied => self.load_results(ctx).await,
            FlowState::ResultsLoaded => Ok(FlowState::Paginating { page: 1 }),
            FlowState::Paginating { page } => self.turn_page(ctx, page).await,
            FlowState::Completed { .. } => self.request_artifact(ctx).await,
            FlowState::ArtifactRequested { source } => self.place_artifact(ctx, source).await,
            terminal @ (FlowState::Done(_) | FlowState::Error(_)) => Ok(terminal),
        }
    }

    /// Start → FacetSelected
    pub async fn select_item(&mut self, ctx: &mut HarvestCtx) -> FlowResult<FlowState> {
        let portal = self.portal.as_ref();
        let table = &self.profile.locators;

        if self.profile.reload_per_item {
            portal.goto(&self.profile.entry_url).await?;
            if self.profile.parent_facet && !ctx.facet.is_empty() {
                select_parent_facet(portal, table, &ctx.facet, &self.retry).await?;
            }
        }

        let trigger = table.item_trigger()?;
        self.scroll_best_effort(trigger, ctx.item.index).await?;
        self.retry
            .invoke(portal, trigger, ctx.item.index, UiAction::Click, UiRole::WorkItemTrigger.label())
            .await?;

        if let Some(detail) = table.get(UiRole::ItemDetail) {
            self.wait_present(detail, UiRole::ItemDetail.label(), self.timeouts.element)
                .await?;
        }

        self.refine_label(ctx).await?;
        info!("{} ✓ 已选中", ctx);
        Ok(FlowState::FacetSelected)
    }

    /// 根据详情中的名称和时段修正条目名
    async fn refine_label(&self, ctx: &mut HarvestCtx) -> FlowResult<()> {
        let table = &self.profile.locators;
        let Some(name_cell) = table.get(UiRole::DetailName) else {
            return Ok(());
        };

        self.wait_present(name_cell, UiRole::DetailName.label(), self.timeouts.element)
            .await?;
        let raw_name = self.portal.text(name_cell, 0).await?;

        let raw_slot = match table.get(UiRole::DetailSlot) {
            Some(slot_cell) if self.portal.probe(slot_cell, 0).await?.present => {
                self.portal.text(slot_cell, 0).await?
            }
            _ => String::new(),
        };

        let refined = refined_label(&raw_name, &raw_slot);
        if !refined.is_empty() {
            let name = sanitize(&refined);
            debug!("条目名修正: {} -> {}", ctx.item.name, name);
            ctx.item.name = name;
        }
        Ok(())
    }

    /// FacetSelected → OptionsApplied
    pub async fn apply_options(&mut self, ctx: &mut HarvestCtx) -> FlowResult<FlowState> {
        let Some(toggle) = self.profile.locators.get(UiRole::OptionToggle) else {
            return Ok(FlowState::OptionsApplied);
        };

        let short = self.retry.with_timeout(self.timeouts.option);
        match short
            .invoke(self.portal.as_ref(), toggle, 0, UiAction::Click, UiRole::OptionToggle.label())
            .await
        {
            Ok(_) => debug!("{} 已打开可选开关", ctx),
            Err(e) if e.is_item_scoped() => warn!("{} ⚠️ 可选开关不可用，继续: {}", ctx, e),
            Err(e) => return Err(e),
        }
        Ok(FlowState::OptionsApplied)
    }

    /// OptionsApplied → ResultsLoaded
    pub async fn load_results(&mut self, ctx: &mut HarvestCtx) -> FlowResult<FlowState> {
        let table = &self.profile.locators;

        if let Some(generate) = table.get(UiRole::GenerateButton) {
            self.retry
                .invoke(self.portal.as_ref(), generate, 0, UiAction::Click, UiRole::GenerateButton.label())
                .await?;
        }

        if let Some(first) = table.get(UiRole::ResultItem) {
            let portal = self.portal.as_ref();
            poll_until(
                UiRole::ResultItem.label(),
                self.timeouts.poll_interval,
                self.timeouts.results,
                move || async move { Ok(portal.probe(first, 0).await?.visible.then_some(())) },
            )
            .await?;
            info!("{} ✓ 结果已加载", ctx);
        }

        Ok(FlowState::ResultsLoaded)
    }

    /// Paginating{page} → Paginating{page + 1} | Completed
    ///
    /// 翻页后内容没变只会继续等待，是否结束只看翻页按钮是否存在、是否可用
    pub async fn turn_page(&mut self, ctx: &mut HarvestCtx, page: usize) -> FlowResult<FlowState> {
        if self.profile.select_sub_items {
            self.check_sub_items(ctx, page).await?;
        }

        let table = &self.profile.locators;
        let Some(advance) = table.get(UiRole::AdvanceButton) else {
            return Ok(FlowState::Completed { pages: page });
        };

        if page >= self.timeouts.max_pages {
            warn!(
                "{} ⚠️ 已达到翻页上限 {} 页，停止翻页",
                ctx, self.timeouts.max_pages
            );
            return Ok(FlowState::Completed { pages: page });
        }

        let first = table.require(UiRole::ResultItem)?;
        let change = ContentChange::new(self.portal.as_ref(), first, self.fingerprint.clone());
        let before = PageState {
            fingerprint: change.fingerprint().await?.unwrap_or_default(),
            item_count: self.portal.count(first).await?,
        };
        debug!("{} 第 {} 页: {:?}", ctx, page, before);

        let state = self.portal.probe(advance, 0).await?;
        if !state.present || !state.enabled {
            info!("{} ✓ 翻页结束，共 {} 页", ctx, page);
            return Ok(FlowState::Completed { pages: page });
        }

        self.scroll_best_effort(advance, 0).await?;
        self.retry
            .with_timeout(self.timeouts.option)
            .invoke(self.portal.as_ref(), advance, 0, UiAction::Click, UiRole::AdvanceButton.label())
            .await?;

        let after = change
            .wait_for_change(&before.fingerprint, self.timeouts.poll_interval, self.timeouts.page_change)
            .await?;
        debug!(
            "{} 第 {} 页 → 第 {} 页 (指纹 {} → {})",
            ctx,
            page,
            page + 1,
            before.fingerprint,
            after
        );
        Ok(FlowState::Paginating { page: page + 1 })
    }

    /// 勾选当前页所有子项；一个都没有视为失败，单个勾选失败只记录
    async fn check_sub_items(&self, ctx: &HarvestCtx, page: usize) -> FlowResult<()> {
        let boxes = self.profile.locators.require(UiRole::SelectableItem)?;
        let portal = self.portal.as_ref();

        let total = portal.count(boxes).await?;
        if total == 0 {
            return Err(FlowError::not_found(format!(
                "第 {} 页没有{}",
                page,
                UiRole::SelectableItem.label()
            )));
        }

        let short = self.retry.with_timeout(self.timeouts.option);
        let mut checked = 0;
        for nth in 0..total {
            match short
                .invoke(portal, boxes, nth, UiAction::Check, UiRole::SelectableItem.label())
                .await
            {
                Ok(_) => checked += 1,
                Err(e) if e.is_item_scoped() => {
                    warn!("{} ⚠️ 第 {} 页第 {} 个子项勾选失败: {}", ctx, page, nth + 1, e)
                }
                Err(e) => return Err(e),
            }
        }
        debug!("{} 第 {} 页勾选 {}/{}", ctx, page, checked, total);
        Ok(())
    }

    /// Completed → ArtifactRequested
    pub async fn request_artifact(&mut self, ctx: &mut HarvestCtx) -> FlowResult<FlowState> {
        let export = self.profile.locators.require(UiRole::ExportButton)?.clone();

        self.scroll_best_effort(&export, 0).await?;
        let baseline = self.arrival.baseline().await?;
        self.retry
            .invoke(self.portal.as_ref(), &export, 0, UiAction::Click, UiRole::ExportButton.label())
            .await?;
        info!("{} 📦 已请求导出，等待文件落地...", ctx);

        let source = self
            .arrival
            .wait_for_new(&baseline, self.timeouts.file_poll_interval, self.timeouts.download)
            .await?;
        Ok(FlowState::ArtifactRequested { source })
    }

    /// ArtifactRequested → Done
    pub async fn place_artifact(
        &mut self,
        ctx: &mut HarvestCtx,
        source: std::path::PathBuf,
    ) -> FlowResult<FlowState> {
        let placed = self
            .placer
            .place(&source, &ctx.facet_dir, &ctx.item.name)
            .await?;
        Ok(FlowState::Done(placed))
    }

    /// 离开条目详情（返回按钮）；未配置时什么也不做
    pub async fn exit_item(&self, ctx: &HarvestCtx) -> FlowResult<()> {
        let Some(back) = self.profile.locators.get(UiRole::BackButton) else {
            return Ok(());
        };
        self.retry
            .invoke(self.portal.as_ref(), back, 0, UiAction::Click, UiRole::BackButton.label())
            .await?;
        debug!("{} 已返回列表", ctx);
        Ok(())
    }

    async fn wait_present(&self, locator: &Locator, what: &str, timeout: std::time::Duration) -> FlowResult<()> {
        let portal = self.portal.as_ref();
        poll_until(what, self.timeouts.poll_interval, timeout, move || async move {
            Ok(portal.probe(locator, 0).await?.present.then_some(()))
        })
        .await
        .map_err(|e| match e {
            FlowError::Timeout { .. } => FlowError::not_found(what),
            other => other,
        })
    }

    /// 滚动失败不影响后续点击，只有会话丢失才向上返回
    async fn scroll_best_effort(&self, locator: &Locator, nth: usize) -> FlowResult<()> {
        match self.portal.scroll_into_view(locator, nth).await {
            Err(FlowError::SessionLost(reason)) => Err(FlowError::SessionLost(reason)),
            Err(e) => {
                debug!("滚动失败，忽略: {}", e);
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }
}

/// 详情名称取 '-' 之后的部分，时段取 '+' 分隔的第一段
pub fn refined_label(raw_name: &str, raw_slot: &str) -> String {
    let raw_name = raw_name.trim();
    let name = match raw_name.split('-').map(str::trim).nth(1) {
        Some(part) => part,
        None => raw_name,
    };

    let slot = raw_slot
        .split('+')
        .map(str::trim)
        .find(|part| !part.is_empty())
        .unwrap_or("");

    format!("{} {}", name, slot).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refined_label_takes_name_after_dash_and_first_slot() {
        assert_eq!(refined_label("10234 - Dr. Ada Lovelace - SCOPE", "A1+TA1"), "Dr. Ada Lovelace A1");
        assert_eq!(refined_label("Plain Name", " + L31+L32"), "Plain Name L31");
        assert_eq!(refined_label("", ""), "");
    }

    #[test]
    fn state_display_is_readable() {
        assert_eq!(FlowState::Paginating { page: 3 }.to_string(), "第 3 页");
        assert!(FlowState::Error("x".into()).is_terminal());
        assert!(!FlowState::Completed { pages: 1 }.is_terminal());
    }
}
