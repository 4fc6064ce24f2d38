use std::path::Path;

use anyhow::Result;
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::error::{AppError, BrowserError};

/// 启动浏览器并打开一个空白页面
pub async fn launch_browser(headless: bool, chrome_executable: Option<&str>) -> Result<(Browser, Page)> {
    info!("🚀 启动浏览器 (无头: {})...", headless);

    let mut builder = BrowserConfig::builder();
    if !headless {
        builder = builder.with_head();
    }
    if let Some(path) = chrome_executable {
        builder = builder.chrome_executable(Path::new(path));
    }

    let config = builder
        .args(vec![
            "--disable-gpu",           // 无头模式下禁用 GPU
            "--no-sandbox",            // 禁用沙盒，防止权限问题导致的崩溃
            "--disable-dev-shm-usage", // 防止共享内存不足
        ])
        .build()
        .map_err(|reason| {
            error!("配置浏览器失败: {}", reason);
            AppError::Browser(BrowserError::ConfigurationFailed { reason })
        })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        AppError::Browser(BrowserError::LaunchFailed {
            source: Box::new(e),
        })
    })?;
    debug!("浏览器启动成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let page = browser.new_page("about:blank").await.map_err(|e| {
        error!("创建页面失败: {}", e);
        AppError::Browser(BrowserError::PageCreationFailed {
            source: Box::new(e),
        })
    })?;

    Ok((browser, page))
}

/// 让浏览器把所有下载直接写入投放目录（需要绝对路径）
pub async fn route_downloads(browser: &Browser, drop_dir: &Path) -> Result<()> {
    let absolute = std::fs::canonicalize(drop_dir)
        .map_err(|e| AppError::file_read_failed(drop_dir.display().to_string(), e))?;
    let path = absolute.display().to_string();

    let mut params = SetDownloadBehaviorParams::new(SetDownloadBehaviorBehavior::Allow);
    params.download_path = Some(path.clone());

    browser.execute(params).await.map_err(|e| {
        AppError::Browser(BrowserError::DownloadRoutingFailed {
            path: path.clone(),
            source: Box::new(e),
        })
    })?;

    info!("✓ 下载目录: {}", path);
    Ok(())
}
