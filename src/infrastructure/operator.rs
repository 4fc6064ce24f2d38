//! 操作员交互 - 基础设施层
//!
//! 登录确认、输入学科名这类阻塞式问答，核心流程只接收问答结果。

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{stdin, stdout, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

/// 操作员接口
#[async_trait]
pub trait Operator: Send + Sync {
    /// 显示提示并阻塞，直到操作员确认（回车）
    async fn confirm(&self, prompt: &str) -> Result<()>;

    /// 显示提示并读取一行输入（已去除首尾空白）
    async fn ask(&self, prompt: &str) -> Result<String>;
}

/// 基于标准输入输出的操作员
pub struct ConsoleOperator {
    lines: Mutex<tokio::io::Lines<BufReader<tokio::io::Stdin>>>,
}

impl ConsoleOperator {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(stdin()).lines()),
        }
    }

    async fn read_line(&self, prompt: &str) -> Result<String> {
        let mut out = stdout();
        out.write_all(prompt.as_bytes()).await?;
        out.flush().await?;

        let line = self
            .lines
            .lock()
            .await
            .next_line()
            .await
            .context("读取标准输入失败")?
            .context("标准输入已关闭")?;
        Ok(line.trim().to_string())
    }
}

impl Default for ConsoleOperator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operator for ConsoleOperator {
    async fn confirm(&self, prompt: &str) -> Result<()> {
        self.read_line(&format!("{} [回车继续] ", prompt)).await?;
        Ok(())
    }

    async fn ask(&self, prompt: &str) -> Result<String> {
        self.read_line(&format!("{} ", prompt)).await
    }
}

/// 反复询问直到得到非空输入
pub async fn ask_non_empty(operator: &dyn Operator, prompt: &str) -> Result<String> {
    loop {
        let answer = operator.ask(prompt).await?;
        if !answer.is_empty() {
            return Ok(answer);
        }
        println!("输入不能为空，请重新输入。");
    }
}
