//! 应用生命周期 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：运行记录、产物目录、浏览器、下载目录、登录会话
//! 2. **操作员循环**：输入分面（或确认页面）→ 处理分面 → 询问是否继续
//! 3. **资源管理**：唯一持有 Browser 的模块，退出时关闭会话和浏览器
//! 4. **全局统计**：汇总所有分面的处理结果

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chromiumoxide::Browser;
use tracing::{error, info, warn};

use crate::browser;
use crate::config::Config;
use crate::error::AppError;
use crate::infrastructure::operator::ask_non_empty;
use crate::infrastructure::{CdpPortal, DropDirectory, Operator, Portal};
use crate::models::{resolve_profile, PortalProfile};
use crate::orchestrator::harvest::harvest_facet;
use crate::services::{Session, SessionManager, SkipWriter};
use crate::utils::logging::{self, RunTotals};
use crate::workflow::FlowDriver;

/// 操作员在一个分面结束后的选择
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextStep {
    Again,
    Quit,
}

/// 应用主结构
pub struct App {
    config: Config,
    browser: Browser,
    /// 浏览器由本程序启动（退出时关闭），否则只断开连接
    launched: bool,
    operator: Box<dyn Operator>,
    session: Session,
    driver: FlowDriver,
    skip_writer: SkipWriter,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config, operator: Box<dyn Operator>) -> Result<Self> {
        logging::init_transcript(&config.transcript_file, &config.profile)
            .await
            .with_context(|| format!("无法初始化运行记录: {}", config.transcript_file))?;
        logging::log_startup(&config);

        let profile = resolve_profile(
            &config.profile,
            config.profile_file.as_deref(),
            config.portal_url.as_deref(),
        )
        .await?;

        // 产物根目录创建失败是致命错误
        tokio::fs::create_dir_all(&config.destination_root)
            .await
            .map_err(|e| AppError::create_dir_failed(config.destination_root.clone(), e))?;

        let drop_dir = DropDirectory::new(&config.drop_dir);
        drop_dir.ensure().await.map_err(AppError::from)?;

        let (browser, page, launched) = match config.browser_debug_port {
            Some(port) => {
                let (browser, page) =
                    browser::connect_to_browser_and_page(port, Some(&profile.entry_url)).await?;
                (browser, page, false)
            }
            None => {
                let (browser, page) =
                    browser::launch_browser(config.headless, config.chrome_executable.as_deref())
                        .await?;
                (browser, page, true)
            }
        };
        browser::route_downloads(&browser, drop_dir.path()).await?;

        let portal: Arc<dyn Portal> = Arc::new(CdpPortal::new(page));
        let session = session_manager(&config, &profile)
            .acquire(portal, operator.as_ref())
            .await?;

        let driver = FlowDriver::new(session.portal(), profile, config.timeouts, drop_dir)?;
        let skip_writer = SkipWriter::with_path(config.transcript_file.clone());

        Ok(Self {
            config,
            browser,
            launched,
            operator,
            session,
            driver,
            skip_writer,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(mut self) -> Result<()> {
        let mut totals = RunTotals::default();
        let outcome = self.harvest_loop(&mut totals).await;

        logging::print_final_stats(&totals, &self.config.transcript_file);
        self.shutdown().await;
        outcome
    }

    async fn harvest_loop(&mut self, totals: &mut RunTotals) -> Result<()> {
        let destination_root = PathBuf::from(&self.config.destination_root);

        loop {
            let facet = if self.driver.profile().parent_facet {
                ask_non_empty(self.operator.as_ref(), "请输入学科名称 (必填):").await?
            } else {
                String::new()
            };

            match harvest_facet(&mut self.driver, &self.skip_writer, &destination_root, &facet).await {
                Ok(stats) => {
                    totals.facets += 1;
                    totals.items += stats.total;
                    totals.placed += stats.placed;
                    totals.skipped += stats.skipped;
                }
                Err(e) if e.is_item_scoped() => {
                    error!("❌ 分面处理失败: {}", e);
                }
                Err(fatal) => {
                    error!("❌ 浏览器会话丢失，停止运行: {}", fatal);
                    return Err(AppError::from(fatal).into());
                }
            }

            if self.ask_next_step().await? == NextStep::Quit {
                return Ok(());
            }
        }
    }

    async fn ask_next_step(&self) -> Result<NextStep> {
        let operator = self.operator.as_ref();

        if self.driver.profile().parent_facet {
            let answer = operator.ask("继续处理其他学科? (y/n):").await?;
            return Ok(if is_yes(&answer) { NextStep::Again } else { NextStep::Quit });
        }

        let again = operator.ask("在当前页面再运行一次? (y/n):").await?;
        if is_yes(&again) {
            return Ok(NextStep::Again);
        }
        let cmd = operator
            .ask("在浏览器中打开另一门课程后按回车继续，输入 q 退出:")
            .await?;
        Ok(if cmd.eq_ignore_ascii_case("q") {
            NextStep::Quit
        } else {
            NextStep::Again
        })
    }

    async fn shutdown(self) {
        self.session.close();
        if self.launched {
            let mut browser = self.browser;
            if let Err(e) = browser.close().await {
                warn!("⚠️ 关闭浏览器失败: {}", e);
            }
            let _ = browser.wait().await;
        }
        info!("👋 已退出");
    }
}

fn session_manager(config: &Config, profile: &PortalProfile) -> SessionManager {
    let state_path = profile
        .persist_session
        .then(|| Path::new(&config.session_state_file).to_path_buf());
    SessionManager::new(state_path, profile.entry_url.clone())
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
