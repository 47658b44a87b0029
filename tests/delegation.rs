//! Integration tests for resident/run-once coordination.
//!
//! Each test binds a resident to an ephemeral loopback port and drives it
//! with a real `DelegationClient`. Capture, OCR and clipboard are scripted.

use snipcopy_lib::client::{Delegation, DelegationClient};
use snipcopy_lib::dispatch::{Dispatcher, PopupSink};
use snipcopy_lib::gate::BusyGate;
use snipcopy_lib::resident::{loopback, Resident};
use snipcopy_lib::session::TriggerSource;
use snipcopy_lib::standalone::{run_once, Route};
use snipcopy_lib::testing::{Event, Harness};
use snipcopy_lib::workflow::Workflow;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

async fn start_resident(harness: &Harness, gate: Arc<BusyGate>) -> SocketAddr {
    let dispatcher = Arc::new(Dispatcher::new(gate, Arc::new(harness.workflow())));
    let resident = Resident::bind(loopback(0), dispatcher).await.unwrap();
    let addr = resident.local_addr().unwrap();
    tokio::spawn(resident.serve());
    addr
}

async fn port_with_no_resident() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

fn client(addr: SocketAddr) -> DelegationClient {
    DelegationClient::new(addr).with_timeouts(Duration::from_millis(500), Duration::from_secs(5))
}

fn never_built() -> Result<Workflow, Infallible> {
    panic!("standalone path must not run when a resident answered");
}

// ── Delegation round-trip ────────────────────────────────────────────

#[tokio::test]
async fn delegated_success_exits_zero() {
    let resident_side = Harness::new().ocr_reply(Ok("delegated text".into()));
    let addr = start_resident(&resident_side, BusyGate::new()).await;

    let report = run_once(&client(addr), never_built).await;

    assert_eq!(report.route, Route::Delegated);
    assert_eq!(report.exit_code, 0);
    assert_eq!(
        resident_side.clipboard.writes(),
        vec!["delegated text".to_string()]
    );
}

#[tokio::test]
async fn delegated_session_runs_countdown_first() {
    let resident_side = Harness::new();
    let addr = start_resident(&resident_side, BusyGate::new()).await;

    assert!(matches!(
        client(addr).try_run_once().await,
        Delegation::Delegated(Ok(()))
    ));

    let recorder = &resident_side.recorder;
    let countdown = recorder.first_tick(|e| matches!(e, Event::Countdown(_))).unwrap();
    let recognize = recorder.first_tick(|e| matches!(e, Event::Recognize(_))).unwrap();
    assert!(countdown < recognize);
}

#[tokio::test]
async fn resident_ocr_failure_is_surfaced_without_fallback() {
    let resident_side = Harness::new().ocr_reply(Err("vision api down".into()));
    let addr = start_resident(&resident_side, BusyGate::new()).await;

    let report = run_once(&client(addr), never_built).await;

    assert_eq!(report.route, Route::Delegated);
    assert_eq!(report.exit_code, 1);
}

// ── Busy propagation ────────────────────────────────────────────────

#[tokio::test]
async fn busy_resident_answers_busy_and_caller_does_not_fall_back() {
    let resident_side = Harness::new();
    let gate = BusyGate::new();
    let addr = start_resident(&resident_side, Arc::clone(&gate)).await;

    // A hotkey session is in flight.
    let _active = gate.try_admit().unwrap();

    let started = std::time::Instant::now();
    match client(addr).try_run_once().await {
        Delegation::Delegated(Err(reason)) => assert_eq!(reason, "busy"),
        other => panic!("expected ERROR:busy, got {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(2));

    let report = run_once(&client(addr), never_built).await;
    assert_eq!(report.route, Route::Delegated);
    assert_eq!(report.exit_code, 1);
    assert!(resident_side.recorder.events().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn hotkey_and_delegation_share_one_gate() {
    let resident_side = Harness::new().ocr_delay(Duration::from_millis(300));
    let gate = BusyGate::new();
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&gate),
        Arc::new(resident_side.workflow()),
    ));
    let resident = Resident::bind(loopback(0), Arc::clone(&dispatcher))
        .await
        .unwrap();
    let addr = resident.local_addr().unwrap();
    tokio::spawn(resident.serve());

    let hotkey = {
        let dispatcher = Arc::clone(&dispatcher);
        let sink = PopupSink::new(resident_side.popup());
        tokio::spawn(async move { dispatcher.trigger(TriggerSource::Hotkey, &sink).await })
    };
    while !gate.is_busy() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let delegated = client(addr).try_run_once().await;
    assert!(matches!(delegated, Delegation::Delegated(Err(ref r)) if r == "busy"));

    assert!(hotkey.await.unwrap().is_success());
    assert_eq!(
        resident_side
            .recorder
            .count(|e| matches!(e, Event::Countdown(_))),
        1
    );
}

// ── Standalone fallback ─────────────────────────────────────────────

#[tokio::test]
async fn no_resident_falls_back_to_standalone_success() {
    let local = Harness::new().ocr_reply(Ok("local text".into()));
    let addr = port_with_no_resident().await;

    let report = run_once(&client(addr), || Ok::<_, Infallible>(local.workflow())).await;

    assert_eq!(report.route, Route::Standalone);
    assert_eq!(report.exit_code, 0);
    assert_eq!(local.clipboard.writes(), vec!["local text".to_string()]);
    // Standalone closes its own popup after the success text.
    assert_eq!(local.recorder.events().last(), Some(&Event::Close));
}

#[tokio::test]
async fn standalone_exit_code_reflects_standalone_outcome() {
    let local = Harness::new().clipboard_failure("no clipboard owner");
    let addr = port_with_no_resident().await;

    let report = run_once(&client(addr), || Ok::<_, Infallible>(local.workflow())).await;

    assert_eq!(report.route, Route::Standalone);
    assert_eq!(report.exit_code, 1);
}

#[tokio::test]
async fn resident_dying_mid_delegation_falls_back() {
    // Accepts the connection, then hangs up without answering.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        drop(stream);
    });

    let local = Harness::new();
    let report = run_once(&client(addr), || Ok::<_, Infallible>(local.workflow())).await;

    assert_eq!(report.route, Route::Standalone);
    assert_eq!(report.exit_code, 0);
}

#[tokio::test]
async fn standalone_setup_failure_exits_non_zero() {
    let addr = port_with_no_resident().await;
    let report = run_once(&client(addr), || Err::<Workflow, _>("no screen source")).await;

    assert_eq!(report.route, Route::Standalone);
    assert_eq!(report.exit_code, 1);
}

// ── Exclusivity ──────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_delegations_admit_one_session() {
    let resident_side = Harness::new().ocr_delay(Duration::from_millis(300));
    let addr = start_resident(&resident_side, BusyGate::new()).await;

    let calls: Vec<_> = (0..5)
        .map(|_| tokio::spawn(async move { client(addr).try_run_once().await }))
        .collect();

    let mut successes = 0;
    let mut busy = 0;
    for call in calls {
        match call.await.unwrap() {
            Delegation::Delegated(Ok(())) => successes += 1,
            Delegation::Delegated(Err(r)) if r == "busy" => busy += 1,
            other => panic!("unexpected delegation result: {other:?}"),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(busy, 4);
    assert_eq!(resident_side.clipboard.writes().len(), 1);
}

#[tokio::test]
async fn second_resident_cannot_claim_the_port() {
    let harness = Harness::new();
    let addr = start_resident(&harness, BusyGate::new()).await;

    let dispatcher = Arc::new(harness.dispatcher(BusyGate::new()));
    assert!(Resident::bind(addr, dispatcher).await.is_err());

    // The original resident is unaffected.
    assert!(matches!(
        client(addr).try_run_once().await,
        Delegation::Delegated(Ok(()))
    ));
    assert_eq!(
        harness.recorder.count(|e| matches!(e, Event::ClipboardWrite(_))),
        1
    );
}
