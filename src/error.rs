use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// 应用程序错误类型
///
/// 只用于边界（启动浏览器、读取配置、创建目录），单个条目的流程错误见 [`FlowError`]
#[derive(Debug)]
pub enum AppError {
    /// 浏览器相关错误
    Browser(BrowserError),
    /// 文件操作错误
    File(FileError),
    /// 配置错误
    Config(ConfigError),
    /// 流程中出现的致命错误（会话丢失）
    Flow(FlowError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Browser(e) => write!(f, "浏览器错误: {}", e),
            AppError::File(e) => write!(f, "文件错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::Flow(e) => write!(f, "流程错误: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Browser(e) => Some(e),
            AppError::File(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Flow(e) => Some(e),
        }
    }
}

/// 浏览器相关错误
#[derive(Debug)]
pub enum BrowserError {
    /// 连接浏览器失败
    ConnectionFailed {
        port: u16,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 启动浏览器失败
    LaunchFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 创建页面失败
    PageCreationFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 浏览器配置失败（builder 返回的是字符串错误）
    ConfigurationFailed { reason: String },
    /// 设置下载目录失败
    DownloadRoutingFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for BrowserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserError::ConnectionFailed { port, source } => {
                write!(f, "无法连接到浏览器 (端口: {}): {}", port, source)
            }
            BrowserError::LaunchFailed { source } => write!(f, "启动浏览器失败: {}", source),
            BrowserError::PageCreationFailed { source } => {
                write!(f, "创建页面失败: {}", source)
            }
            BrowserError::ConfigurationFailed { reason } => {
                write!(f, "浏览器配置失败: {}", reason)
            }
            BrowserError::DownloadRoutingFailed { path, source } => {
                write!(f, "无法把下载目录设置为 {}: {}", path, source)
            }
        }
    }
}

impl std::error::Error for BrowserError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BrowserError::ConnectionFailed { source, .. }
            | BrowserError::LaunchFailed { source }
            | BrowserError::PageCreationFailed { source }
            | BrowserError::DownloadRoutingFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            BrowserError::ConfigurationFailed { .. } => None,
        }
    }
}

/// 文件操作错误
#[derive(Debug)]
pub enum FileError {
    /// 读取文件失败
    ReadFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 创建目录失败
    CreateDirFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// TOML 解析失败
    TomlParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// JSON 解析失败
    JsonParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::ReadFailed { path, source } => {
                write!(f, "读取文件失败 ({}): {}", path, source)
            }
            FileError::WriteFailed { path, source } => {
                write!(f, "写入文件失败 ({}): {}", path, source)
            }
            FileError::CreateDirFailed { path, source } => {
                write!(f, "创建目录失败 ({}): {}", path, source)
            }
            FileError::TomlParseFailed { path, source } => {
                write!(f, "TOML解析失败 ({}): {}", path, source)
            }
            FileError::JsonParseFailed { path, source } => {
                write!(f, "JSON解析失败 ({}): {}", path, source)
            }
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::ReadFailed { source, .. }
            | FileError::WriteFailed { source, .. }
            | FileError::CreateDirFailed { source, .. }
            | FileError::TomlParseFailed { source, .. }
            | FileError::JsonParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
        }
    }
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 未知的门户配置名称
    UnknownProfile { name: String },
    /// 指纹正则无法编译
    InvalidFingerprintPattern {
        pattern: String,
        source: regex::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownProfile { name } => {
                write!(
                    f,
                    "未知的门户配置 '{}' (可选: question-bank, course-archive)",
                    name
                )
            }
            ConfigError::InvalidFingerprintPattern { pattern, source } => {
                write!(f, "指纹正则无效 '{}': {}", pattern, source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::UnknownProfile { .. } => None,
            ConfigError::InvalidFingerprintPattern { source, .. } => Some(source),
        }
    }
}

/// 单个条目流程中的错误
///
/// 除 `SessionLost` 外都只影响当前条目：记录日志后跳过，继续下一个条目。
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// 控件不存在
    #[error("未找到控件: {what}")]
    NotFound { what: String },

    /// 等待超时
    #[error("等待超时 ({waited:?}): {what}")]
    Timeout { what: String, waited: Duration },

    /// 元素引用失效（重新查询一次后仍失效会升级为 NotFound）
    #[error("元素引用已失效: {what}")]
    StaleReference { what: String },

    /// 产物始终没有落地
    #[error("下载超时 ({waited:?}): 投放目录中没有出现新的 {what}")]
    DownloadTimeout { what: String, waited: Duration },

    /// 本地文件操作失败
    #[error("文件操作失败 ({}): {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 浏览器或会话丢失，无法继续
    #[error("浏览器会话丢失: {0}")]
    SessionLost(String),
}

impl FlowError {
    pub fn not_found(what: impl Into<String>) -> Self {
        FlowError::NotFound { what: what.into() }
    }

    pub fn stale(what: impl Into<String>) -> Self {
        FlowError::StaleReference { what: what.into() }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FlowError::Io {
            path: path.into(),
            source,
        }
    }

    /// 是否只影响当前条目
    pub fn is_item_scoped(&self) -> bool {
        !matches!(self, FlowError::SessionLost(_))
    }
}

/// 流程结果类型
pub type FlowResult<T> = Result<T, FlowError>;

// ========== 从常见错误类型转换 ==========
// 注意：不需要手动实现 From<AppError> for anyhow::Error，
// 因为 anyhow 已经为所有实现了 std::error::Error 的类型提供了自动实现

/// 页面导航时 Chrome 报告的执行上下文失效
fn is_context_lost(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("execution context was destroyed")
        || message.contains("cannot find context")
}

impl From<chromiumoxide::error::CdpError> for FlowError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        use chromiumoxide::error::CdpError;

        match err {
            CdpError::Timeout => FlowError::Timeout {
                what: "浏览器命令".to_string(),
                waited: Duration::ZERO,
            },
            // 连接层故障：浏览器已不可用
            CdpError::Ws(_)
            | CdpError::ChannelSendError(_)
            | CdpError::NoResponse
            | CdpError::Io(_)
            | CdpError::LaunchExit(..) => FlowError::SessionLost(err.to_string()),
            CdpError::JavascriptException(_) => FlowError::stale(err.to_string()),
            CdpError::Chrome(_) | CdpError::ChromeMessage(_) => {
                let message = err.to_string();
                if is_context_lost(&message) {
                    FlowError::stale(message)
                } else {
                    FlowError::not_found(message)
                }
            }
            other => FlowError::not_found(other.to_string()),
        }
    }
}

impl From<FlowError> for AppError {
    fn from(err: FlowError) -> Self {
        AppError::Flow(err)
    }
}

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::PageCreationFailed {
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建浏览器连接错误
    pub fn browser_connection_failed(
        port: u16,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Browser(BrowserError::ConnectionFailed {
            port,
            source: Box::new(source),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建目录创建错误
    pub fn create_dir_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::CreateDirFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
