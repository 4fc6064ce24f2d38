//! 日志工具模块
//!
//! 提供日志初始化、运行记录文件和统计输出的辅助函数

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// 初始化 tracing 日志（默认 info 级别，`RUST_LOG` 可覆盖）
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // 测试中可能重复初始化，忽略错误
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化运行记录文件
///
/// 写入表头；跳过记录随后逐行追加
pub async fn init_transcript(path: &str, profile: &str) -> Result<()> {
    let header = format!(
        "{}\n抓取记录 ({}) - {}\n{}\n\n",
        "=".repeat(60),
        profile,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    tokio::fs::write(path, header).await?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 门户抓取模式: {}", config.profile);
    info!("📁 产物目录: {}", config.destination_root);
    info!("📥 投放目录: {}", config.drop_dir);
    info!("{}", "=".repeat(60));
}

/// 累计统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunTotals {
    pub facets: usize,
    pub items: usize,
    pub placed: usize,
    pub skipped: usize,
}

/// 打印最终统计信息
pub fn print_final_stats(totals: &RunTotals, transcript_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("📚 分面: {}", totals.facets);
    info!("✅ 已保存: {}/{}", totals.placed, totals.items);
    info!("❌ 跳过: {}", totals.skipped);
    info!("{}", "=".repeat(60));
    info!("\n跳过记录已保存至: {}", transcript_path);
}
