mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fast_timeouts, Call, FakeElement, FakePortal, ScriptedOperator};
use portal_harvest::infrastructure::{Locator, Portal};
use portal_harvest::models::{LocatorTable, UiRole};
use portal_harvest::services::facet_enumerator::{enumerate, facet_folder_name};
use portal_harvest::services::{Invocation, RetryPolicy, SessionManager, SessionOrigin, UiAction};
use portal_harvest::FlowError;
use tokio_test::{assert_err, assert_ok};

fn retry() -> RetryPolicy {
    RetryPolicy::new(Duration::from_millis(80), Duration::from_millis(10))
}

// ========== 重试策略 ==========

#[tokio::test]
async fn failed_native_click_falls_back_exactly_once() {
    let portal = FakePortal::new();
    let button = Locator::css("#export");
    portal
        .set(&button, vec![FakeElement::ready("导出")])
        .fail_native_click(&button);

    let outcome = assert_ok!(
        retry()
            .invoke(&portal, &button, 0, UiAction::Click, "导出按钮")
            .await
    );

    assert_eq!(outcome, Invocation::Fallback);
    assert_eq!(portal.clicks_on(&button), (1, 1));
}

#[tokio::test]
async fn present_but_disabled_uses_fallback_without_native_click() {
    let portal = FakePortal::new();
    let button = Locator::css("#next");
    portal.set(&button, vec![FakeElement::disabled("下一页")]);

    let outcome = retry()
        .invoke(&portal, &button, 0, UiAction::Click, "翻页按钮")
        .await
        .unwrap();

    assert_eq!(outcome, Invocation::Fallback);
    assert_eq!(portal.clicks_on(&button), (0, 1));
}

#[tokio::test]
async fn never_present_is_not_found_without_any_click() {
    let portal = FakePortal::new();
    let button = Locator::css("#missing");

    let err = assert_err!(
        retry()
            .invoke(&portal, &button, 0, UiAction::Click, "不存在的按钮")
            .await
    );

    assert!(matches!(err, FlowError::NotFound { .. }));
    assert_eq!(portal.clicks_on(&button), (0, 0));
}

#[tokio::test]
async fn check_skips_already_checked_box() {
    let portal = FakePortal::new();
    let boxes = Locator::css("input.cb");
    let mut checked = FakeElement::ready("");
    checked.state.checked = true;
    portal.set(&boxes, vec![checked, FakeElement::ready("")]);

    let policy = retry();
    assert_eq!(
        policy.invoke(&portal, &boxes, 0, UiAction::Check, "子项").await.unwrap(),
        Invocation::AlreadyDone
    );
    assert_eq!(
        policy.invoke(&portal, &boxes, 1, UiAction::Check, "子项").await.unwrap(),
        Invocation::Primary
    );
    assert!(portal.is_checked(&boxes, 1));
    assert_eq!(portal.clicks_on(&boxes), (1, 0));
}

// ========== 会话管理 ==========

#[tokio::test]
async fn session_bootstraps_then_reloads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state").join("portal_state.json");
    let manager = SessionManager::new(Some(state_path.clone()), "https://portal.example/bank");

    let first_portal = Arc::new(FakePortal::new());
    let operator = ScriptedOperator::new(&[]);
    let session = manager
        .acquire(first_portal.clone() as Arc<dyn Portal>, &operator)
        .await
        .unwrap();

    assert_eq!(session.origin(), SessionOrigin::Bootstrapped);
    assert_eq!(operator.prompts().len(), 1);
    assert!(state_path.exists());
    assert_eq!(
        first_portal.calls(),
        vec![Call::Goto("https://portal.example/bank".to_string()), Call::Export]
    );
    session.close();

    let second_portal = Arc::new(FakePortal::new());
    let quiet = ScriptedOperator::new(&[]);
    let session = manager
        .acquire(second_portal.clone() as Arc<dyn Portal>, &quiet)
        .await
        .unwrap();

    assert_eq!(session.origin(), SessionOrigin::Restored);
    assert!(quiet.prompts().is_empty());
    assert_eq!(
        second_portal.calls(),
        vec![Call::Import(1), Call::Goto("https://portal.example/bank".to_string())]
    );
}

#[tokio::test]
async fn corrupt_state_file_falls_back_to_bootstrap() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("portal_state.json");
    std::fs::write(&state_path, "{ not json").unwrap();

    let manager = SessionManager::new(Some(state_path.clone()), "https://portal.example");
    let portal = Arc::new(FakePortal::new());
    let operator = ScriptedOperator::new(&[]);
    let session = manager
        .acquire(portal.clone() as Arc<dyn Portal>, &operator)
        .await
        .unwrap();

    assert_eq!(session.origin(), SessionOrigin::Bootstrapped);
    let saved = std::fs::read_to_string(&state_path).unwrap();
    assert!(saved.contains("\"sid\""));
}

#[tokio::test]
async fn session_without_state_path_is_never_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let manager = SessionManager::new(None, "https://vtop.example");
    let portal = Arc::new(FakePortal::new());
    let operator = ScriptedOperator::new(&[]);

    let session = manager
        .acquire(portal.clone() as Arc<dyn Portal>, &operator)
        .await
        .unwrap();

    assert_eq!(session.origin(), SessionOrigin::Interactive);
    assert_eq!(operator.prompts().len(), 1);
    assert!(!portal.calls().contains(&Call::Export));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

// ========== 条目枚举 ==========

#[tokio::test]
async fn enumerate_uses_placeholder_for_blank_labels() {
    let portal = FakePortal::new();
    let modules = Locator::css("li.module");
    portal.set(
        &modules,
        vec![
            FakeElement::ready("Module 1\nIntro"),
            FakeElement::ready("   "),
            FakeElement::ready("A/B: Vectors"),
        ],
    );
    let table = LocatorTable::new().with(UiRole::WorkItem, modules);

    let items = enumerate(&portal, &table, &fast_timeouts()).await.unwrap();

    let labels: Vec<_> = items.iter().map(|i| i.raw_label.as_str()).collect();
    assert_eq!(labels, vec!["Module 1", "Item_2", "A/B: Vectors"]);
    assert_eq!(items[2].name, "A_B_ Vectors");
    assert_eq!(items[1].index, 1);
}

#[tokio::test]
async fn enumerate_keeps_going_when_a_label_cannot_be_read() {
    let portal = FakePortal::new();
    let rows = Locator::css("tr.row");
    portal.set(
        &rows,
        vec![
            FakeElement::ready("Row A"),
            FakeElement::missing(),
            FakeElement::ready("Row C"),
        ],
    );
    let table = LocatorTable::new().with(UiRole::WorkItem, rows);

    let items = enumerate(&portal, &table, &fast_timeouts()).await.unwrap();

    let labels: Vec<_> = items.iter().map(|i| i.raw_label.as_str()).collect();
    assert_eq!(labels, vec!["Row A", "Item_2"]);
}

#[tokio::test]
async fn enumerate_without_items_is_not_found() {
    let portal = FakePortal::new();
    let table = LocatorTable::new().with(UiRole::WorkItem, Locator::css("li.module"));

    let err = enumerate(&portal, &table, &fast_timeouts()).await.unwrap_err();
    assert!(matches!(err, FlowError::NotFound { .. }));
}

#[tokio::test]
async fn folder_name_prefers_header_cells() {
    let portal = FakePortal::new();
    let code = Locator::css("td.code");
    let title = Locator::css("td.title");
    portal
        .set(&code, vec![FakeElement::ready(" CSE1001 ")])
        .set(&title, vec![FakeElement::ready("Problem Solving: Python")]);

    let with_header = LocatorTable::new()
        .with(UiRole::FacetHeaderCode, code)
        .with(UiRole::FacetHeaderTitle, title);
    assert_eq!(
        facet_folder_name(&portal, &with_header, "").await.unwrap(),
        "CSE1001 Problem Solving_ Python"
    );

    let plain = LocatorTable::new();
    assert_eq!(
        facet_folder_name(&portal, &plain, "Physics / Optics").await.unwrap(),
        "Physics _ Optics"
    );
}
