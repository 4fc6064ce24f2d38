//! 条目枚举 - 业务能力层
//!
//! 只负责"当前分面下有哪些条目"，不处理条目本身

use tracing::{debug, info, warn};

use crate::config::Timeouts;
use crate::error::{FlowError, FlowResult};
use crate::infrastructure::{Locator, Portal};
use crate::models::{LocatorTable, UiRole, WorkItem};
use crate::services::artifact_placer::sanitize;
use crate::services::completion::poll_until;
use crate::services::retry::{RetryPolicy, UiAction};

/// 界面没有文本时的占位名（从 1 开始编号）
pub fn placeholder_label(index: usize) -> String {
    format!("Item_{}", index + 1)
}

/// 打开分面选择器并选中文本匹配的选项
pub async fn select_parent_facet(
    portal: &dyn Portal,
    table: &LocatorTable,
    facet: &str,
    retry: &RetryPolicy,
) -> FlowResult<()> {
    let picker = table.require(UiRole::FacetPicker)?;
    retry
        .invoke(portal, picker, 0, UiAction::Click, UiRole::FacetPicker.label())
        .await?;

    let option = Locator::text(facet);
    retry
        .invoke(portal, &option, 0, UiAction::Click, &format!("分面选项 '{}'", facet))
        .await?;

    debug!("已选择分面: {}", facet);
    Ok(())
}

/// 按界面顺序列出所有条目
///
/// 先有上限地等待第一个条目出现，再逐个读取文本。不去重，重名交给命名服务处理。
pub async fn enumerate(
    portal: &dyn Portal,
    table: &LocatorTable,
    timeouts: &Timeouts,
) -> FlowResult<Vec<WorkItem>> {
    let locator = table.require(UiRole::WorkItem)?;

    let count = poll_until(
        UiRole::WorkItem.label(),
        timeouts.poll_interval,
        timeouts.element,
        move || async move {
            let n = portal.count(locator).await?;
            Ok((n > 0).then_some(n))
        },
    )
    .await
    .map_err(|e| match e {
        FlowError::Timeout { .. } => FlowError::not_found(UiRole::WorkItem.label()),
        other => other,
    })?;

    let mut items = Vec::with_capacity(count);
    for index in 0..count {
        let text = match portal.text(locator, index).await {
            Ok(text) => text,
            // 读取期间列表被重绘，按空文本处理
            Err(e @ FlowError::StaleReference { .. }) | Err(e @ FlowError::NotFound { .. }) => {
                warn!("⚠️ 第 {} 个条目的名称读取失败，使用占位名: {}", index + 1, e);
                String::new()
            }
            Err(e) => return Err(e),
        };
        let raw_label = match first_line(&text) {
            "" => placeholder_label(index),
            line => line.to_string(),
        };
        let name = sanitize(&raw_label);
        items.push(WorkItem::new(index, raw_label, name));
    }

    info!("✓ 找到 {} 个条目", items.len());
    Ok(items)
}

/// 当前分面的目录名：优先使用页头的课程代码和名称，否则使用操作员输入的分面名
pub async fn facet_folder_name(
    portal: &dyn Portal,
    table: &LocatorTable,
    facet: &str,
) -> FlowResult<String> {
    let mut parts = Vec::new();
    for role in [UiRole::FacetHeaderCode, UiRole::FacetHeaderTitle] {
        if let Some(locator) = table.get(role) {
            if portal.probe(locator, 0).await?.present {
                parts.push(portal.text(locator, 0).await?.trim().to_string());
            }
        }
    }

    let header = parts.join(" ");
    if header.trim().is_empty() {
        Ok(sanitize(facet))
    } else {
        Ok(sanitize(&header))
    }
}

fn first_line(text: &str) -> &str {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_one_based() {
        assert_eq!(placeholder_label(0), "Item_1");
        assert_eq!(placeholder_label(4), "Item_5");
    }

    #[test]
    fn first_line_skips_blank_lines() {
        assert_eq!(first_line("\n  Module 1 \nIntro"), "Module 1");
        assert_eq!(first_line("   \n\t"), "");
    }
}
