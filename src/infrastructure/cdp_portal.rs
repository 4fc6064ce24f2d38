//! CDP 门户 - 基础设施层
//!
//! 持有唯一的 Page 资源，通过页面内执行 JS 实现 [`Portal`]。
//! 每次操作都在页面里重新解析定位器，不缓存元素句柄。

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::error::{FlowError, FlowResult};
use crate::infrastructure::portal::{ElementState, Locator, Portal, SessionState, StoredCookie};

/// 页面内的定位与操作脚本
///
/// 占位符 `__LOCATOR__` / `__NTH__` / `__OP__` / `__MARK__` 在调用前替换
const ELEMENT_OP_JS: &str = r#"
(() => {
    const resolveAll = (loc, root) => {
        switch (loc.kind) {
            case 'css':
                return Array.from(root.querySelectorAll(loc.value));
            case 'xpath': {
                const snap = document.evaluate(loc.value, root, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
                const out = [];
                for (let i = 0; i < snap.snapshotLength; i++) out.push(snap.snapshotItem(i));
                return out;
            }
            case 'text': {
                const scope = root === document ? document.body : root;
                const hits = (el) => (el.innerText || '').includes(loc.value);
                return Array.from(scope.querySelectorAll('*'))
                    .filter((el) => hits(el) && !Array.from(el.children).some(hits));
            }
            case 'scoped':
                return resolveAll(loc.value.parent, root)
                    .map((p) => resolveAll(loc.value.child, p)[0] || null);
            default:
                return [];
        }
    };

    const locator = __LOCATOR__;
    const nth = __NTH__;
    const op = __OP__;
    const all = resolveAll(locator, document);

    if (op === 'count') return { status: 'ok', value: all.filter(Boolean).length };

    const el = all[nth];
    if (!el) {
        if (op === 'probe') {
            return { status: 'ok', value: { present: false, visible: false, enabled: false, checked: false } };
        }
        return { status: 'missing' };
    }
    if (!el.isConnected) return { status: 'stale' };

    switch (op) {
        case 'probe': {
            const style = window.getComputedStyle(el);
            const visible = el.getClientRects().length > 0
                && style.visibility !== 'hidden'
                && style.display !== 'none';
            const enabled = !el.disabled
                && el.getAttribute('disabled') === null
                && el.getAttribute('aria-disabled') !== 'true';
            return { status: 'ok', value: { present: true, visible, enabled, checked: !!el.checked } };
        }
        case 'text':
            return { status: 'ok', value: (el.innerText || el.textContent || '').trim() };
        case 'force_click':
            el.click();
            return { status: 'ok' };
        case 'scroll':
            el.scrollIntoView({ block: 'center' });
            return { status: 'ok' };
        case 'mark':
            el.setAttribute('data-harvest-target', __MARK__);
            return { status: 'ok' };
        default:
            return { status: 'missing' };
    }
})()
"#;

#[derive(Debug, Deserialize)]
struct OpReply {
    status: String,
    #[serde(default)]
    value: JsonValue,
}

fn parse_state(value: JsonValue, locator: &Locator, nth: usize) -> FlowResult<ElementState> {
    serde_json::from_value(value)
        .map_err(|e| FlowError::not_found(format!("{} [{}] 状态无法解析: {}", locator, nth, e)))
}

/// 基于 chromiumoxide 的门户实现
pub struct CdpPortal {
    page: Page,
    next_mark: AtomicU64,
}

impl CdpPortal {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            next_mark: AtomicU64::new(1),
        }
    }

    /// 获取 page 的引用
    pub fn page(&self) -> &Page {
        &self.page
    }

    async fn eval(&self, js_code: impl Into<String>) -> FlowResult<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value: JsonValue = result
            .into_value()
            .map_err(|e| FlowError::not_found(format!("页面脚本没有返回值: {}", e)))?;
        Ok(json_value)
    }

    async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> FlowResult<T> {
        let json_value = self.eval(js_code).await?;
        serde_json::from_value(json_value)
            .map_err(|e| FlowError::not_found(format!("页面脚本返回了无法解析的结果: {}", e)))
    }

    async fn element_op(
        &self,
        op: &str,
        locator: &Locator,
        nth: usize,
        mark: u64,
    ) -> FlowResult<JsonValue> {
        let locator_json = serde_json::to_string(locator)
            .map_err(|e| FlowError::not_found(format!("定位器无法序列化: {}", e)))?;
        let js_code = ELEMENT_OP_JS
            .replace("__LOCATOR__", &locator_json)
            .replace("__NTH__", &nth.to_string())
            .replace("__OP__", &format!("{:?}", op))
            .replace("__MARK__", &format!("\"{}\"", mark));

        let reply: OpReply = self.eval_as(js_code).await?;
        match reply.status.as_str() {
            "ok" => Ok(reply.value),
            "stale" => Err(FlowError::stale(format!("{} [{}]", locator, nth))),
            _ => Err(FlowError::not_found(format!("{} [{}]", locator, nth))),
        }
    }

    async fn restore_local_storage(&self, origin: &str, entries: &[(String, String)]) -> FlowResult<()> {
        self.goto(origin).await?;
        let entries_json = serde_json::to_string(entries)
            .map_err(|e| FlowError::not_found(format!("local storage 无法序列化: {}", e)))?;
        let js_code = format!(
            "(() => {{ for (const [k, v] of {}) localStorage.setItem(k, v); return true; }})()",
            entries_json
        );
        self.eval(js_code).await?;
        debug!("已恢复 {} 条 local storage 记录 ({})", entries.len(), origin);
        Ok(())
    }
}

#[async_trait]
impl Portal for CdpPortal {
    async fn goto(&self, url: &str) -> FlowResult<()> {
        debug!("导航到: {}", url);
        self.page.goto(url).await?;
        Ok(())
    }

    async fn count(&self, locator: &Locator) -> FlowResult<usize> {
        let value = self.element_op("count", locator, 0, 0).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn probe(&self, locator: &Locator, nth: usize) -> FlowResult<ElementState> {
        let value = self.element_op("probe", locator, nth, 0).await?;
        parse_state(value, locator, nth)
    }

    async fn text(&self, locator: &Locator, nth: usize) -> FlowResult<String> {
        let value = self.element_op("text", locator, nth, 0).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn click(&self, locator: &Locator, nth: usize) -> FlowResult<()> {
        // 先在页面里给目标打标记，再用 CDP 找到它做真实的鼠标点击
        let mark = self.next_mark.fetch_add(1, Ordering::Relaxed);
        self.element_op("mark", locator, nth, mark).await?;

        let selector = format!("[data-harvest-target=\"{}\"]", mark);
        let element = self
            .page
            .find_element(selector.as_str())
            .await
            .map_err(|_| FlowError::stale(format!("{} [{}]", locator, nth)))?;
        element
            .click()
            .await
            .map_err(|e| FlowError::stale(format!("{} [{}]: {}", locator, nth, e)))?;

        let cleanup = format!(
            "(() => {{ const el = document.querySelector('{}'); if (el) el.removeAttribute('data-harvest-target'); return true; }})()",
            selector.replace('\'', "\\'")
        );
        if let Err(e) = self.eval(cleanup).await {
            debug!("清理点击标记失败: {}", e);
        }
        Ok(())
    }

    async fn force_click(&self, locator: &Locator, nth: usize) -> FlowResult<()> {
        self.element_op("force_click", locator, nth, 0).await?;
        Ok(())
    }

    async fn scroll_into_view(&self, locator: &Locator, nth: usize) -> FlowResult<()> {
        self.element_op("scroll", locator, nth, 0).await?;
        Ok(())
    }

    async fn export_state(&self) -> FlowResult<SessionState> {
        let cookies = self
            .page
            .get_cookies()
            .await?
            .into_iter()
            .map(|c| StoredCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                secure: c.secure,
                http_only: c.http_only,
            })
            .collect();

        let origin: Option<String> = self.eval_as("location.origin").await.ok();
        let local_storage: Vec<(String, String)> = match self.eval_as("Object.entries(localStorage)").await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("⚠️ 读取 local storage 失败，只保存 cookie: {}", e);
                Vec::new()
            }
        };

        Ok(SessionState {
            saved_at: chrono::Local::now(),
            cookies,
            origin,
            local_storage,
        })
    }

    async fn import_state(&self, state: &SessionState) -> FlowResult<()> {
        let params: Vec<CookieParam> = state
            .cookies
            .iter()
            .map(|c| {
                let mut param = CookieParam::new(c.name.clone(), c.value.clone());
                param.domain = Some(c.domain.clone());
                param.path = Some(c.path.clone());
                param.secure = Some(c.secure);
                param.http_only = Some(c.http_only);
                param
            })
            .collect();
        debug!("导入 {} 个 cookie", params.len());
        self.page.set_cookies(params).await?;

        if let Some(origin) = state.origin.as_deref() {
            if !state.local_storage.is_empty() {
                self.restore_local_storage(origin, &state.local_storage).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_probe_reply_is_an_error_not_absence() {
        let locator = Locator::css("#next");

        let state = parse_state(
            serde_json::json!({"present": true, "visible": true, "enabled": false, "checked": false}),
            &locator,
            0,
        )
        .unwrap();
        assert!(state.present && !state.enabled);

        let err = parse_state(serde_json::json!("oops"), &locator, 0).unwrap_err();
        assert!(matches!(err, FlowError::NotFound { .. }));
    }
}
