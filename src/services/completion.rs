//! 异步完成检测 - 业务能力层
//!
//! 两种检测共用一个轮询组合子 [`poll_until`]：
//! - [`ContentChange`]：动作前后第一条结果的指纹是否变化
//! - [`FileArrival`]：投放目录里是否出现了完整落地的新文件

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use regex::Regex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::error::{FlowError, FlowResult};
use crate::infrastructure::{DropDirectory, Locator, Portal};
use crate::models::profile::ArrivalRule;

/// 指纹没有匹配到正则时截取的长度
const FINGERPRINT_FALLBACK_CHARS: usize = 80;

/// 按固定间隔轮询，直到探针给出结果或超时
///
/// 探针返回：
/// - `Ok(Some(v))` 完成
/// - `Ok(None)` 继续等待
/// - `Err(StaleReference)` 第一次容忍（下次重新查询），紧接着再次失效升级为 `NotFound`
/// - 其他错误直接返回
pub async fn poll_until<T, F, Fut>(
    what: &str,
    interval: Duration,
    timeout: Duration,
    mut probe: F,
) -> FlowResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FlowResult<Option<T>>>,
{
    let deadline = Instant::now() + timeout;
    let mut stale_seen = false;

    loop {
        match probe().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => stale_seen = false,
            Err(FlowError::StaleReference { what: stale_what }) => {
                if stale_seen {
                    return Err(FlowError::not_found(format!(
                        "{} (元素引用连续失效: {})",
                        what, stale_what
                    )));
                }
                debug!("元素引用失效，重新查询: {}", stale_what);
                stale_seen = true;
            }
            Err(e) => return Err(e),
        }

        if Instant::now() >= deadline {
            return Err(FlowError::Timeout {
                what: what.to_string(),
                waited: timeout,
            });
        }
        sleep(interval).await;
    }
}

/// 一次对比的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Changed(String),
    Unchanged,
}

/// 内容变化检测
pub struct ContentChange<'a> {
    portal: &'a dyn Portal,
    first_result: &'a Locator,
    pattern: Option<Regex>,
}

impl<'a> ContentChange<'a> {
    pub fn new(portal: &'a dyn Portal, first_result: &'a Locator, pattern: Option<Regex>) -> Self {
        Self {
            portal,
            first_result,
            pattern,
        }
    }

    /// 从文本中提取指纹：正则第一个捕获组，否则取前 80 个字符
    pub fn extract(pattern: Option<&Regex>, text: &str) -> String {
        if let Some(caps) = pattern.and_then(|re| re.captures(text)) {
            if let Some(m) = caps.get(1) {
                return m.as_str().to_string();
            }
        }
        text.chars()
            .take(FINGERPRINT_FALLBACK_CHARS)
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// 第一条结果的指纹；没有结果时返回 `None`
    pub async fn fingerprint(&self) -> FlowResult<Option<String>> {
        if !self.portal.probe(self.first_result, 0).await?.present {
            return Ok(None);
        }
        let text = self.portal.text(self.first_result, 0).await?;
        Ok(Some(Self::extract(self.pattern.as_ref(), &text)))
    }

    /// 与动作前的指纹对比一次
    pub async fn probe(&self, before: &str) -> FlowResult<Change> {
        match self.fingerprint().await? {
            Some(after) if !after.is_empty() && after != before => Ok(Change::Changed(after)),
            _ => Ok(Change::Unchanged),
        }
    }

    /// 等待指纹变化，返回新指纹
    pub async fn wait_for_change(
        &self,
        before: &str,
        interval: Duration,
        timeout: Duration,
    ) -> FlowResult<String> {
        let this = self;
        poll_until("翻页后内容变化", interval, timeout, move || async move {
            match this.probe(before).await? {
                Change::Changed(after) => Ok(Some(after)),
                Change::Unchanged => Ok(None),
            }
        })
        .await
    }
}

/// 文件落地检测
///
/// 同一个检测器在整个运行期间复用，已认领的文件不会被第二次返回。
pub struct FileArrival {
    drop_dir: DropDirectory,
    rule: ArrivalRule,
    claimed: HashSet<String>,
}

impl FileArrival {
    pub fn new(drop_dir: DropDirectory, rule: ArrivalRule) -> Self {
        Self {
            drop_dir,
            rule,
            claimed: HashSet::new(),
        }
    }

    /// 记录动作前的文件名
    pub async fn baseline(&self) -> FlowResult<HashSet<String>> {
        self.drop_dir.snapshot().await
    }

    /// 本次列表中满足条件的文件名
    ///
    /// `last_sizes` 保存上一次看到的大小，用来判断是否还在写入
    fn qualifying(
        &self,
        baseline: &HashSet<String>,
        listing: &BTreeMap<String, u64>,
        last_sizes: &BTreeMap<String, u64>,
    ) -> Option<String> {
        listing
            .iter()
            .filter(|(name, _)| !baseline.contains(*name) && !self.claimed.contains(*name))
            .filter(|(name, _)| self.rule.matches_extension(name))
            .filter(|(name, _)| !self.rule.is_in_progress_name(name))
            .filter(|(name, _)| {
                // 带下载中后缀的同名兄弟文件还在时，说明还没写完
                !self
                    .rule
                    .in_progress_suffixes
                    .iter()
                    .any(|suffix| listing.contains_key(&format!("{}{}", name, suffix)))
            })
            .find(|(name, size)| {
                !self.rule.require_stable_size || last_sizes.get(*name) == Some(*size)
            })
            .map(|(name, _)| name.clone())
    }

    /// 等待一个新文件完整落地并认领它
    pub async fn wait_for_new(
        &mut self,
        baseline: &HashSet<String>,
        interval: Duration,
        timeout: Duration,
    ) -> FlowResult<PathBuf> {
        let what = format!(".{} 文件", self.rule.extension);
        let last_sizes: Mutex<BTreeMap<String, u64>> = Mutex::new(BTreeMap::new());

        let found = {
            let this = &*self;
            let sizes = &last_sizes;
            poll_until(&what, interval, timeout, move || async move {
                let listing = this.drop_dir.listing().await?;
                let mut sizes = sizes.lock().unwrap_or_else(|e| e.into_inner());
                let hit = this.qualifying(baseline, &listing, &sizes);
                *sizes = listing;
                Ok(hit)
            })
            .await
        };

        match found {
            Ok(name) => {
                self.claimed.insert(name.clone());
                debug!("认领产物: {}", name);
                Ok(self.drop_dir.path().join(name))
            }
            Err(FlowError::Timeout { what, waited }) => {
                warn!("⚠️ {:?} 内没有等到新的{}", waited, what);
                Err(FlowError::DownloadTimeout { what, waited })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FAST: Duration = Duration::from_millis(10);

    #[tokio::test]
    async fn poll_until_returns_first_value() {
        let calls = &AtomicUsize::new(0);
        let value = poll_until("计数", FAST, Duration::from_secs(1), move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Ok(if n >= 2 { Some(n) } else { None })
        })
        .await
        .unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn poll_until_times_out() {
        let err = poll_until::<(), _, _>("永远不会完成", FAST, Duration::from_millis(50), || async {
            Ok(None)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, FlowError::Timeout { .. }));
    }

    #[tokio::test]
    async fn poll_until_tolerates_one_stale_reference() {
        let calls = &AtomicUsize::new(0);
        let value = poll_until("一次失效", FAST, Duration::from_secs(1), move || async move {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 => Err(FlowError::stale("row")),
                _ => Ok(Some("ok")),
            }
        })
        .await
        .unwrap();
        assert_eq!(value, "ok");
    }

    #[tokio::test]
    async fn second_stale_reference_escalates_to_not_found() {
        let err = poll_until::<(), _, _>("连续失效", FAST, Duration::from_secs(1), || async {
            Err(FlowError::stale("row"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, FlowError::NotFound { .. }));
    }

    #[tokio::test]
    async fn stale_references_separated_by_clean_probe_are_tolerated() {
        let calls = &AtomicUsize::new(0);
        let value = poll_until("间隔失效", FAST, Duration::from_secs(1), move || async move {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 | 2 => Err(FlowError::stale("row")),
                1 => Ok(None),
                n => Ok(Some(n)),
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn fingerprint_prefers_pattern_capture() {
        let re = Regex::new(r"Question ID:\s*(\d+)").unwrap();
        assert_eq!(
            ContentChange::extract(Some(&re), "Q1. What?\nQuestion ID: 4711\nMarks 5"),
            "4711"
        );
        let long = "x".repeat(200);
        assert_eq!(ContentChange::extract(Some(&re), &long).len(), 80);
        assert_eq!(ContentChange::extract(None, "  short  "), "short");
    }

    #[tokio::test]
    async fn file_arrival_ignores_in_progress_marker() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.zip"), b"old").unwrap();

        let mut arrival = FileArrival::new(DropDirectory::new(dir.path()), ArrivalRule::new("zip"));
        let baseline = arrival.baseline().await.unwrap();

        let root = dir.path().to_path_buf();
        let writer = tokio::spawn(async move {
            let partial = root.join("b.zip.partial");
            tokio::fs::write(&partial, b"half").await.unwrap();
            sleep(Duration::from_millis(120)).await;
            tokio::fs::write(&partial, b"half and the rest").await.unwrap();
            tokio::fs::rename(&partial, root.join("b.zip")).await.unwrap();
        });

        let path = arrival
            .wait_for_new(&baseline, FAST, Duration::from_secs(5))
            .await
            .unwrap();
        writer.await.unwrap();

        assert_eq!(path.file_name().unwrap(), "b.zip");
        assert!(!dir.path().join("b.zip.partial").exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"half and the rest");
    }

    #[tokio::test]
    async fn file_arrival_waits_for_sibling_marker_to_vanish() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.zip"), b"payload").unwrap();
        std::fs::write(dir.path().join("b.zip.crdownload"), b"").unwrap();

        let mut arrival = FileArrival::new(DropDirectory::new(dir.path()), ArrivalRule::new("zip"));
        let baseline = HashSet::new();

        let early = arrival
            .wait_for_new(&baseline, FAST, Duration::from_millis(60))
            .await
            .unwrap_err();
        assert!(matches!(early, FlowError::DownloadTimeout { .. }));

        std::fs::remove_file(dir.path().join("b.zip.crdownload")).unwrap();
        let path = arrival
            .wait_for_new(&baseline, FAST, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "b.zip");
    }

    #[tokio::test]
    async fn claimed_file_is_not_returned_twice() {
        let dir = tempfile::tempdir().unwrap();
        let mut arrival = FileArrival::new(DropDirectory::new(dir.path()), ArrivalRule::new("pdf"));
        let baseline = arrival.baseline().await.unwrap();
        std::fs::write(dir.path().join("export.pdf"), b"pdf").unwrap();

        arrival
            .wait_for_new(&baseline, FAST, Duration::from_secs(2))
            .await
            .unwrap();
        let again = arrival
            .wait_for_new(&baseline, FAST, Duration::from_millis(60))
            .await
            .unwrap_err();
        assert!(matches!(again, FlowError::DownloadTimeout { .. }));
    }
}
