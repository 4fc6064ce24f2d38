//! 测试用的内存门户与操作员
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use portal_harvest::infrastructure::{
    ElementState, Locator, Operator, Portal, SessionState, StoredCookie,
};
use portal_harvest::{FlowError, FlowResult, Timeouts};

/// 测试中使用的短超时
pub fn fast_timeouts() -> Timeouts {
    Timeouts {
        element: Duration::from_millis(100),
        option: Duration::from_millis(60),
        results: Duration::from_millis(150),
        page_change: Duration::from_millis(300),
        download: Duration::from_secs(2),
        poll_interval: Duration::from_millis(10),
        file_poll_interval: Duration::from_millis(20),
        max_pages: 10,
    }
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub state: ElementState,
    pub text: String,
}

impl FakeElement {
    pub fn ready(text: &str) -> Self {
        Self {
            state: ElementState {
                present: true,
                visible: true,
                enabled: true,
                checked: false,
            },
            text: text.to_string(),
        }
    }

    pub fn disabled(text: &str) -> Self {
        let mut el = Self::ready(text);
        el.state.enabled = false;
        el
    }

    /// 列表中的空位（该下标处没有元素）
    pub fn missing() -> Self {
        Self {
            state: ElementState::absent(),
            text: String::new(),
        }
    }
}

/// 点击后页面发生的变化
#[derive(Debug, Clone)]
pub enum Effect {
    Set(Locator, Vec<FakeElement>),
    Remove(Locator),
    WriteFile(PathBuf, Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Goto(String),
    Click(Locator, usize),
    ForceClick(Locator, usize),
    Export,
    Import(usize),
}

#[derive(Default)]
struct Dom {
    elements: HashMap<Locator, Vec<FakeElement>>,
    texts: HashMap<Locator, VecDeque<String>>,
    on_click: HashMap<(Locator, usize), VecDeque<Vec<Effect>>>,
    native_click_fails: HashSet<Locator>,
    calls: Vec<Call>,
}

impl Dom {
    fn element(&self, locator: &Locator, nth: usize) -> Option<&FakeElement> {
        self.elements
            .get(locator)
            .and_then(|els| els.get(nth))
            .filter(|el| el.state.present)
    }

    fn activate(&mut self, locator: &Locator, nth: usize) {
        if let Some(el) = self.elements.get_mut(locator).and_then(|els| els.get_mut(nth)) {
            el.state.checked = !el.state.checked;
        }
        let effects = self
            .on_click
            .get_mut(&(locator.clone(), nth))
            .and_then(|queue| queue.pop_front())
            .unwrap_or_default();
        for effect in effects {
            match effect {
                Effect::Set(target, els) => {
                    self.elements.insert(target, els);
                }
                Effect::Remove(target) => {
                    self.elements.remove(&target);
                }
                Effect::WriteFile(path, bytes) => {
                    std::fs::write(path, bytes).expect("write fake download");
                }
            }
        }
    }
}

/// 脚本化的内存门户
#[derive(Default)]
pub struct FakePortal {
    dom: Mutex<Dom>,
}

impl FakePortal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, locator: &Locator, elements: Vec<FakeElement>) -> &Self {
        self.dom
            .lock()
            .unwrap()
            .elements
            .insert(locator.clone(), elements);
        self
    }

    /// 第一个元素的文本依次返回这些值，最后一个值保持不变
    pub fn script_texts(&self, locator: &Locator, texts: &[&str]) -> &Self {
        self.dom.lock().unwrap().texts.insert(
            locator.clone(),
            texts.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    /// 追加"下一次点击"的效果
    pub fn on_click(&self, locator: &Locator, nth: usize, effects: Vec<Effect>) -> &Self {
        self.dom
            .lock()
            .unwrap()
            .on_click
            .entry((locator.clone(), nth))
            .or_default()
            .push_back(effects);
        self
    }

    pub fn fail_native_click(&self, locator: &Locator) -> &Self {
        self.dom
            .lock()
            .unwrap()
            .native_click_fails
            .insert(locator.clone());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.dom.lock().unwrap().calls.clone()
    }

    pub fn clicks_on(&self, locator: &Locator) -> (usize, usize) {
        let calls = self.calls();
        let native = calls
            .iter()
            .filter(|c| matches!(c, Call::Click(l, _) if l == locator))
            .count();
        let forced = calls
            .iter()
            .filter(|c| matches!(c, Call::ForceClick(l, _) if l == locator))
            .count();
        (native, forced)
    }

    pub fn is_checked(&self, locator: &Locator, nth: usize) -> bool {
        self.dom
            .lock()
            .unwrap()
            .element(locator, nth)
            .map(|el| el.state.checked)
            .unwrap_or(false)
    }
}

#[async_trait]
impl Portal for FakePortal {
    async fn goto(&self, url: &str) -> FlowResult<()> {
        self.dom.lock().unwrap().calls.push(Call::Goto(url.to_string()));
        Ok(())
    }

    async fn count(&self, locator: &Locator) -> FlowResult<usize> {
        let dom = self.dom.lock().unwrap();
        Ok(dom
            .elements
            .get(locator)
            .map(|els| els.iter().filter(|el| el.state.present).count())
            .unwrap_or(0))
    }

    async fn probe(&self, locator: &Locator, nth: usize) -> FlowResult<ElementState> {
        let dom = self.dom.lock().unwrap();
        Ok(dom
            .element(locator, nth)
            .map(|el| el.state)
            .unwrap_or_else(ElementState::absent))
    }

    async fn text(&self, locator: &Locator, nth: usize) -> FlowResult<String> {
        let mut dom = self.dom.lock().unwrap();
        if nth == 0 {
            if let Some(queue) = dom.texts.get_mut(locator) {
                if queue.len() > 1 {
                    return Ok(queue.pop_front().unwrap_or_default());
                }
                if let Some(last) = queue.front() {
                    return Ok(last.clone());
                }
            }
        }
        dom.element(locator, nth)
            .map(|el| el.text.clone())
            .ok_or_else(|| FlowError::not_found(locator.to_string()))
    }

    async fn click(&self, locator: &Locator, nth: usize) -> FlowResult<()> {
        let mut dom = self.dom.lock().unwrap();
        dom.calls.push(Call::Click(locator.clone(), nth));
        if dom.native_click_fails.contains(locator) {
            return Err(FlowError::stale(format!("{} 被遮挡", locator)));
        }
        let ready = dom
            .element(locator, nth)
            .map(|el| el.state.is_ready())
            .unwrap_or(false);
        if !ready {
            return Err(FlowError::not_found(locator.to_string()));
        }
        dom.activate(locator, nth);
        Ok(())
    }

    async fn force_click(&self, locator: &Locator, nth: usize) -> FlowResult<()> {
        let mut dom = self.dom.lock().unwrap();
        dom.calls.push(Call::ForceClick(locator.clone(), nth));
        if dom.element(locator, nth).is_none() {
            return Err(FlowError::not_found(locator.to_string()));
        }
        dom.activate(locator, nth);
        Ok(())
    }

    async fn scroll_into_view(&self, locator: &Locator, nth: usize) -> FlowResult<()> {
        let dom = self.dom.lock().unwrap();
        dom.element(locator, nth)
            .map(|_| ())
            .ok_or_else(|| FlowError::not_found(locator.to_string()))
    }

    async fn export_state(&self) -> FlowResult<SessionState> {
        self.dom.lock().unwrap().calls.push(Call::Export);
        Ok(SessionState {
            saved_at: chrono::Local::now(),
            cookies: vec![StoredCookie {
                name: "sid".to_string(),
                value: "abc".to_string(),
                domain: "portal.example".to_string(),
                path: "/".to_string(),
                secure: true,
                http_only: true,
            }],
            origin: Some("https://portal.example".to_string()),
            local_storage: vec![("token".to_string(), "t-1".to_string())],
        })
    }

    async fn import_state(&self, state: &SessionState) -> FlowResult<()> {
        self.dom
            .lock()
            .unwrap()
            .calls
            .push(Call::Import(state.cookies.len()));
        Ok(())
    }
}

/// 按顺序给出预设回答的操作员
#[derive(Default)]
pub struct ScriptedOperator {
    answers: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOperator {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Operator for ScriptedOperator {
    async fn confirm(&self, prompt: &str) -> anyhow::Result<()> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(())
    }

    async fn ask(&self, prompt: &str) -> anyhow::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("没有更多预设回答"))
    }
}

/// 目录中的文件名（排序）
pub fn file_names(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
