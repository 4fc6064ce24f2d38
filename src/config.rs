use std::time::Duration;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 门户配置名称（question-bank / course-archive）
    pub profile: String,
    /// 自定义门户配置 TOML 文件（覆盖内置配置）
    pub profile_file: Option<String>,
    /// 覆盖门户入口 URL
    pub portal_url: Option<String>,
    /// 浏览器调试端口；设置后连接已有浏览器，否则自行启动
    pub browser_debug_port: Option<u16>,
    /// 启动浏览器时是否无头
    pub headless: bool,
    /// 浏览器可执行文件路径
    pub chrome_executable: Option<String>,
    /// 产物最终存放的根目录
    pub destination_root: String,
    /// 浏览器下载的投放目录
    pub drop_dir: String,
    /// 登录状态持久化文件
    pub session_state_file: String,
    /// 运行记录文件
    pub transcript_file: String,
    /// 各类等待时长
    pub timeouts: Timeouts,
}

/// 所有等待的上限与轮询间隔
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
    /// 等待控件出现/可点击
    pub element: Duration,
    /// 可选开关的等待（缺失不算失败）
    pub option: Duration,
    /// 等待第一条结果
    pub results: Duration,
    /// 翻页后等待内容变化
    pub page_change: Duration,
    /// 等待产物文件落地
    pub download: Duration,
    /// 页面内容轮询间隔
    pub poll_interval: Duration,
    /// 投放目录轮询间隔
    pub file_poll_interval: Duration,
    /// 翻页上限
    pub max_pages: usize,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            element: Duration::from_secs(20),
            option: Duration::from_secs(5),
            results: Duration::from_secs(20),
            page_change: Duration::from_secs(20),
            download: Duration::from_secs(120),
            poll_interval: Duration::from_millis(200),
            file_poll_interval: Duration::from_millis(500),
            max_pages: 500,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: "question-bank".to_string(),
            profile_file: None,
            portal_url: None,
            browser_debug_port: None,
            headless: false,
            chrome_executable: None,
            destination_root: "downloads".to_string(),
            drop_dir: ".harvest_drop".to_string(),
            session_state_file: "portal_state.json".to_string(),
            transcript_file: "harvest_log.txt".to_string(),
            timeouts: Timeouts::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            profile: std::env::var("HARVEST_PROFILE").unwrap_or(default.profile),
            profile_file: std::env::var("HARVEST_PROFILE_FILE").ok().or(default.profile_file),
            portal_url: std::env::var("PORTAL_URL").ok().or(default.portal_url),
            browser_debug_port: std::env::var("BROWSER_DEBUG_PORT").ok().and_then(|v| v.parse().ok()).or(default.browser_debug_port),
            headless: std::env::var("HEADLESS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.headless),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().or(default.chrome_executable),
            destination_root: std::env::var("DESTINATION_ROOT").unwrap_or(default.destination_root),
            drop_dir: std::env::var("DROP_DIR").unwrap_or(default.drop_dir),
            session_state_file: std::env::var("SESSION_STATE_FILE").unwrap_or(default.session_state_file),
            transcript_file: std::env::var("TRANSCRIPT_FILE").unwrap_or(default.transcript_file),
            timeouts: Timeouts::from_env(default.timeouts),
        }
    }
}

impl Timeouts {
    fn from_env(default: Self) -> Self {
        Self {
            element: env_millis("ELEMENT_TIMEOUT_MS").unwrap_or(default.element),
            option: env_millis("OPTION_TIMEOUT_MS").unwrap_or(default.option),
            results: env_millis("RESULTS_TIMEOUT_MS").unwrap_or(default.results),
            page_change: env_millis("PAGE_CHANGE_TIMEOUT_MS").unwrap_or(default.page_change),
            download: env_millis("DOWNLOAD_TIMEOUT_MS").unwrap_or(default.download),
            poll_interval: env_millis("POLL_INTERVAL_MS").unwrap_or(default.poll_interval),
            file_poll_interval: env_millis("FILE_POLL_INTERVAL_MS").unwrap_or(default.file_poll_interval),
            max_pages: std::env::var("MAX_PAGES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_pages),
        }
    }
}

fn env_millis(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
}
