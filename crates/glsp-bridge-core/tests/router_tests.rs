//! Routing behavior across several open diagram panels.

use glsp_bridge_core::{
    DiagnosticSeverity, InterceptorConfig, Router, RouterOptions, SaveDialogOptions, ServerChannel,
};
use glsp_bridge_protocol::{Action, FitToScreenAction};
use glsp_bridge_test_utils::{builders, ChannelProbe, HostCall, RecordingHost};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    router: Router,
    server: ServerChannel,
    to_server: ChannelProbe<Value>,
}

fn harness_with(host: RecordingHost, interceptors: InterceptorConfig) -> Harness {
    let server = ServerChannel::new();
    let router = Router::new(
        RouterOptions::new(server.clone())
            .with_host(Arc::new(host))
            .with_interceptors(interceptors),
    );
    let to_server = ChannelProbe::attach(&server.to_server);
    Harness {
        router,
        server,
        to_server,
    }
}

fn harness() -> Harness {
    harness_with(RecordingHost::new(), InterceptorConfig::default())
}

#[test]
fn test_two_panels_on_same_path_are_independent() {
    let h = harness();
    let a = builders::open_client(&h.router, "wf_0", "file:///same.wf", true);
    let b = builders::open_client(&h.router, "wf_1", "file:///same.wf", false);
    assert_ne!(a.document().id(), b.document().id());

    a.client.from_client().fire(builders::select("wf_0", &["n1"]));
    b.client.from_client().fire(builders::select("wf_1", &["n2", "n3"]));
    h.server
        .from_server
        .fire(builders::markers("wf_1", &[("broken", "error")]));

    a.client.panel().dispose();

    assert!(h.router.client("wf_0").is_none());
    assert_eq!(h.router.selection("wf_1"), vec!["n2", "n3"]);
    // wf_1 is still open on the URI: its diagnostics survive.
    assert_eq!(h.router.diagnostics("file:///same.wf").len(), 1);
}

#[test]
fn test_active_selection_follows_focus() {
    let h = harness();
    let a = builders::open_client(&h.router, "wf_0", "file:///a.wf", true);
    let b = builders::open_client(&h.router, "wf_1", "file:///b.wf", false);

    a.client.from_client().fire(builders::select("wf_0", &["n1"]));
    b.client.from_client().fire(builders::select("wf_1", &["n2"]));
    assert_eq!(h.router.active_selection(), vec!["n1"]);

    a.client.panel().set_active(false);
    b.client.panel().set_active(true);
    assert_eq!(h.router.active_selection(), vec!["n2"]);

    b.client.panel().set_active(false);
    assert!(h.router.active_selection().is_empty());
}

#[test]
fn test_dispose_twice_is_noop() {
    let h = harness();
    let a = builders::open_client(&h.router, "wf_0", "file:///a.wf", true);
    h.server
        .from_server
        .fire(builders::markers("wf_0", &[("x", "warning")]));

    let cleared = Arc::new(Mutex::new(Vec::new()));
    let sink = cleared.clone();
    let _sub = h
        .router
        .on_diagnostics_changed(move |change| sink.lock().unwrap().push(change.clone()));

    assert!(h.router.dispose_client("wf_0"));
    assert!(!h.router.dispose_client("wf_0"));
    a.client.panel().dispose();

    assert!(h.router.diagnostics("file:///a.wf").is_empty());
    let cleared = cleared.lock().unwrap();
    assert_eq!(cleared.len(), 1);
    assert_eq!(cleared[0].uri, "file:///a.wf");
    assert!(cleared[0].diagnostics.is_empty());
}

#[test]
fn test_markers_after_dispose_are_not_stored() {
    let h = harness();
    let a = builders::open_client(&h.router, "wf_0", "file:///a.wf", true);
    a.client.panel().dispose();

    h.server
        .from_server
        .fire(builders::markers("wf_0", &[("late", "error")]));
    assert!(h.router.diagnostics("file:///a.wf").is_empty());
}

#[test]
fn test_diagnostics_mapping_preserves_order() {
    let h = harness();
    let _a = builders::open_client(&h.router, "wf_0", "file:///a.wf", true);

    h.server.from_server.fire(builders::markers(
        "wf_0",
        &[("one", "info"), ("two", "error"), ("three", "warning")],
    ));

    let diagnostics = h.router.diagnostics("file:///a.wf");
    let summary: Vec<(&str, DiagnosticSeverity)> = diagnostics
        .iter()
        .map(|d| (d.message.as_str(), d.severity))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("one", DiagnosticSeverity::Information),
            ("two", DiagnosticSeverity::Error),
            ("three", DiagnosticSeverity::Warning),
        ]
    );
}

#[test]
fn test_export_svg_is_never_forwarded() {
    let h = harness();
    let a = builders::open_client(&h.router, "wf_0", "file:///a.wf", true);

    let export = builders::envelope("wf_0", json!({"kind": "exportSvg", "svg": "<svg/>"}));
    h.server.from_server.fire(export.clone());
    a.client.from_client().fire(export);

    assert!(a.received.is_empty());
    assert!(h.to_server.is_empty());
}

#[test]
fn test_broadcast_reaches_only_the_focused_client() {
    let h = harness();
    let a = builders::open_client(&h.router, "wf_0", "file:///a.wf", false);
    let b = builders::open_client(&h.router, "wf_1", "file:///b.wf", true);

    let fit = Action::Fit(FitToScreenAction::new(vec!["n1".to_string()]));
    assert!(h.router.send_action_to_active_client(&fit));
    assert!(a.received.is_empty());
    assert_eq!(b.received_kinds(), vec!["fit"]);
    assert_eq!(b.received.events()[0]["__localDispatch"], json!(true));

    b.client.panel().set_active(false);
    assert!(!h.router.send_action_to_active_client(&fit));
    assert_eq!(b.received.len(), 1);
}

#[test]
fn test_propagate_hook_can_rewrite_outgoing() {
    let interceptors = InterceptorConfig::new().on_propagate_to_server(|_, processed, _| {
        processed.map(|mut message| {
            message["action"]["tagged"] = json!(true);
            message
        })
    });
    let h = harness_with(RecordingHost::new(), interceptors);
    let a = builders::open_client(&h.router, "wf_0", "file:///a.wf", true);

    a.client
        .from_client()
        .fire(builders::envelope("wf_0", json!({"kind": "changeBounds"})));

    assert_eq!(h.to_server.events()[0]["action"]["tagged"], json!(true));
}

#[test]
fn test_receive_hook_may_continue_later() {
    let parked = Arc::new(Mutex::new(Vec::new()));
    let stash = parked.clone();
    let interceptors = InterceptorConfig::new().on_receive_from_client(move |message, next| {
        stash.lock().unwrap().push((message, next));
    });
    let h = harness_with(RecordingHost::new(), interceptors);
    let a = builders::open_client(&h.router, "wf_0", "file:///a.wf", true);

    a.client
        .from_client()
        .fire(builders::envelope("wf_0", json!({"kind": "layout"})));
    assert!(h.to_server.is_empty());

    let (message, next) = parked.lock().unwrap().pop().unwrap();
    next.pass(message);
    assert_eq!(h.to_server.len(), 1);
}

#[tokio::test]
async fn test_navigation_opens_target_with_merged_options() {
    let host = RecordingHost::new();
    let h = harness_with(host.clone(), InterceptorConfig::default());
    let a = builders::open_client(&h.router, "wf_0", "file:///a.wf", true);

    h.server.from_server.fire(builders::envelope(
        "wf_0",
        json!({
            "kind": "navigateToExternalTarget",
            "target": {
                "uri": "file:///notes.md",
                "args": {"preserveFocus": true, "jsonOpenerOptions": "{\"preview\": false}"}
            }
        }),
    ));

    let calls = host.wait_for_calls(1, Duration::from_secs(2)).await;
    match &calls[0] {
        HostCall::ShowTextDocument { uri, options } => {
            assert_eq!(uri, "file:///notes.md");
            assert_eq!(options["preserveFocus"], json!(true));
            assert_eq!(options["preview"], json!(false));
        }
        other => panic!("unexpected call {:?}", other),
    }
    assert!(a.received.is_empty());
}

#[tokio::test]
async fn test_failed_navigation_is_swallowed() {
    let host = RecordingHost::new().failing_navigation();
    let h = harness_with(host.clone(), InterceptorConfig::default());
    let a = builders::open_client(&h.router, "wf_0", "file:///a.wf", true);

    h.server.from_server.fire(builders::envelope(
        "wf_0",
        json!({"kind": "navigateToExternalTarget", "target": {"uri": "file:///missing"}}),
    ));
    host.wait_for_calls(1, Duration::from_secs(2)).await;

    // Routing keeps working afterwards.
    h.server
        .from_server
        .fire(builders::envelope("wf_0", json!({"kind": "setModel"})));
    assert_eq!(a.received_kinds(), vec!["setModel"]);
}

#[tokio::test]
async fn test_export_svg_writes_chosen_file() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("diagram.svg");
    let host = RecordingHost::new()
        .with_save_path(target.clone())
        .writing_files();
    let h = harness_with(host.clone(), InterceptorConfig::default());
    let _a = builders::open_client(&h.router, "wf_0", "file:///a.wf", true);

    h.server.from_server.fire(builders::envelope(
        "wf_0",
        json!({"kind": "exportSvg", "svg": "<svg>diagram</svg>", "requestId": ""}),
    ));

    let calls = host.wait_for_calls(2, Duration::from_secs(2)).await;
    assert_eq!(calls[0], HostCall::ShowSaveDialog(SaveDialogOptions::svg_export()));
    assert_eq!(
        calls[1],
        HostCall::WriteFile {
            path: target.clone(),
            contents: "<svg>diagram</svg>".to_string(),
        }
    );
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "<svg>diagram</svg>");
}

#[tokio::test]
async fn test_cancelled_export_writes_nothing() {
    let host = RecordingHost::new();
    let h = harness_with(host.clone(), InterceptorConfig::default());
    let _a = builders::open_client(&h.router, "wf_0", "file:///a.wf", true);

    h.server.from_server.fire(builders::envelope(
        "wf_0",
        json!({"kind": "exportSvg", "svg": "<svg/>"}),
    ));

    host.wait_for_calls(1, Duration::from_secs(2)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(host.calls().len(), 1);
}
