use anyhow::Result;
use portal_harvest::infrastructure::ConsoleOperator;
use portal_harvest::utils::logging;
use portal_harvest::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::from_env();

    // 初始化并运行应用
    App::initialize(config, Box::new(ConsoleOperator::new()))
        .await?
        .run()
        .await?;

    Ok(())
}
