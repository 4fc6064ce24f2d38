//! 单个分面处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块负责处理一个分面下的所有条目，是分面级别的编排器。
//!
//! ## 核心功能
//!
//! 1. **准备目录**：按页头或分面名创建产物目录
//! 2. **枚举条目**：`Vec<WorkItem>`
//! 3. **流程调度**：对每个条目复用同一个 `FlowDriver`
//! 4. **错误隔离**：单个条目失败只记录并跳过；会话丢失才中止
//! 5. **退出步骤**：每个条目结束后（无论成败）返回列表
//! 6. **统计输出**：记录保存/跳过数量

use std::path::Path;

use tokio::fs;
use tracing::{error, info, warn};

use crate::error::{FlowError, FlowResult};
use crate::services::facet_enumerator::{enumerate, facet_folder_name, select_parent_facet};
use crate::services::{PlacedArtifact, SkipWriter};
use crate::workflow::{FlowDriver, HarvestCtx};

/// 分面处理统计
#[derive(Debug, Default)]
pub struct HarvestStats {
    pub total: usize,
    pub placed: usize,
    pub skipped: usize,
    pub artifacts: Vec<PlacedArtifact>,
}

/// 处理一个分面
///
/// # 参数
/// - `driver`: 条目流程（整个运行期间复用）
/// - `skip_writer`: 跳过记录
/// - `destination_root`: 产物根目录
/// - `facet`: 操作员输入的分面名，课程资料门户为空
///
/// # 返回
/// 只有会话丢失、目录无法创建或条目列表无法读取时返回错误
pub async fn harvest_facet(
    driver: &mut FlowDriver,
    skip_writer: &SkipWriter,
    destination_root: &Path,
    facet: &str,
) -> FlowResult<HarvestStats> {
    let timeouts = *driver.timeouts();

    if driver.profile().parent_facet && !facet.is_empty() {
        select_parent_facet(driver.portal(), &driver.profile().locators, facet, driver.retry()).await?;
    }

    let folder = facet_folder_name(driver.portal(), &driver.profile().locators, facet).await?;
    let facet_dir = destination_root.join(&folder);
    fs::create_dir_all(&facet_dir)
        .await
        .map_err(|e| FlowError::io(&facet_dir, e))?;
    info!("📁 分面目录: {}", facet_dir.display());

    let items = enumerate(driver.portal(), &driver.profile().locators, &timeouts).await?;
    log_facet_start(&folder, items.len());

    let mut stats = HarvestStats {
        total: items.len(),
        ..Default::default()
    };

    // ========== 遍历所有条目（Vec<WorkItem>） ==========
    for item in items {
        log_item_start(item.index + 1, stats.total, &item.raw_label);
        let mut ctx = HarvestCtx::new(facet, &facet_dir, item);

        let report = driver.run(&mut ctx).await;
        let entered = report.entered_item();
        let outcome = match report.outcome {
            Ok(placed) => {
                stats.placed += 1;
                stats.artifacts.push(placed);
                Ok(())
            }
            Err(e) if e.is_item_scoped() => {
                stats.skipped += 1;
                if let Err(write_err) = skip_writer.write(facet, &ctx.item, &e).await {
                    warn!("⚠️ 无法写入跳过记录 {}: {}", skip_writer.path(), write_err);
                }
                Ok(())
            }
            Err(fatal) => Err(fatal),
        };

        // 只要打开过详情，不论成败都要返回列表；没打开过则仍在列表页
        outcome?;
        if !entered {
            continue;
        }
        match driver.exit_item(&ctx).await {
            Ok(()) => {}
            Err(e) if e.is_item_scoped() => warn!("{} ⚠️ 返回列表失败: {}", ctx, e),
            Err(fatal) => {
                error!("{} ❌ 返回列表时会话丢失", ctx);
                return Err(fatal);
            }
        }
    }

    log_facet_complete(&folder, &stats);
    Ok(stats)
}

// ========== 日志辅助函数 ==========

fn log_facet_start(folder: &str, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理分面: {}", folder);
    info!("📄 共 {} 个条目", total);
    info!("{}", "=".repeat(60));
}

fn log_item_start(index: usize, total: usize, label: &str) {
    info!("\n{}", "─".repeat(60));
    info!("▶ 条目 {}/{}: {}", index, total, label);
}

fn log_facet_complete(folder: &str, stats: &HarvestStats) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 分面 {} 完成: 保存 {}/{}，跳过 {}",
        folder, stats.placed, stats.total, stats.skipped
    );
    info!("{}", "─".repeat(60));
}
