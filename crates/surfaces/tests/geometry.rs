//! Integration tests for bounds synchronization against a fake window.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod support;

use std::{sync::Arc, time::Duration};

use {
    serde_json::json,
    support::{Event, harness, instance, tool},
    toolbay_surfaces::{Bounds, GeometryTrigger, HostMessage, SyncOutcome},
};

/// Launch `t1` and let the switch-triggered sync settle so each test starts
/// from a quiet window.
async fn launched() -> (support::Harness, toolbay_common::InstanceId) {
    let h = harness();
    let id = instance("t1");
    h.host
        .lifecycle()
        .launch(&id, &tool("t1"), "c1", None)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    h.window.clear();
    h.factory.surface(&id).clear();
    (h, id)
}

async fn next_request(h: &support::Harness) -> u64 {
    loop {
        if let Some(id) = h.window.requests().last() {
            return *id;
        }
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn no_active_surface_skips_the_round_trip() {
    let h = harness();
    let outcome = h.host.geometry().sync_now(GeometryTrigger::Resize).await;
    assert_eq!(outcome, SyncOutcome::NoActiveSurface);
    assert!(h.window.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn valid_response_is_clamped_and_applied() {
    let (h, id) = launched().await;
    let geometry = Arc::clone(h.host.geometry());
    let task = tokio::spawn(async move { geometry.sync_now(GeometryTrigger::Resize).await });

    let request_id = next_request(&h).await;
    let delivered = h
        .host
        .on_bounds_response(
            request_id,
            Some(&json!({"x": 240, "y": -10, "width": 2000, "height": 300})),
        )
        .await;
    assert!(delivered);

    let expected = Bounds {
        x: 240,
        y: 0,
        width: 760,
        height: 300,
    };
    assert_eq!(task.await.unwrap(), SyncOutcome::Applied(expected));
    assert_eq!(h.factory.surface(&id).events(), vec![Event::Bounds(expected)]);
}

#[tokio::test(start_paused = true)]
async fn timeout_falls_back_to_full_window() {
    let (h, id) = launched().await;

    let outcome = h.host.geometry().sync_now(GeometryTrigger::Maximize).await;

    let full = Bounds {
        x: 0,
        y: 0,
        width: 1000,
        height: 800,
    };
    assert_eq!(outcome, SyncOutcome::Fallback(full));
    assert_eq!(h.factory.surface(&id).events(), vec![
        Event::Bounds(full),
        Event::Message(HostMessage::ViewportResized {
            width: 1000,
            height: 800,
        }),
    ]);

    // The answer arrives after the deadline: nothing is waiting for it.
    let late = h.window.requests()[0];
    assert!(
        !h.host
            .on_bounds_response(late, Some(&json!({"x": 0, "y": 0, "width": 1, "height": 1})))
            .await
    );
}

#[tokio::test(start_paused = true)]
async fn invalid_response_falls_back_immediately() {
    let (h, _id) = launched().await;
    let geometry = Arc::clone(h.host.geometry());
    let started = tokio::time::Instant::now();
    let task = tokio::spawn(async move { geometry.sync_now(GeometryTrigger::Show).await });

    let request_id = next_request(&h).await;
    h.host
        .on_bounds_response(request_id, Some(&json!({"x": "left"})))
        .await;

    assert!(matches!(task.await.unwrap(), SyncOutcome::Fallback(_)));
    assert!(started.elapsed() < Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn trigger_bursts_coalesce_into_one_request() {
    let (h, _id) = launched().await;

    for trigger in [
        GeometryTrigger::Resize,
        GeometryTrigger::Resize,
        GeometryTrigger::Move,
        GeometryTrigger::EnterFullscreen,
        GeometryTrigger::PanelVisibility,
    ] {
        h.host.on_window_event(trigger);
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.window.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn bounds_apply_only_to_the_active_surface() {
    let (h, a) = launched().await;
    let b = instance("t2");
    h.host
        .lifecycle()
        .launch(&b, &tool("t2"), "c1", None)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let a_bounds = h
        .factory
        .surface(&a)
        .events()
        .into_iter()
        .filter(|e| matches!(e, Event::Bounds(_)))
        .count();
    let b_bounds = h
        .factory
        .surface(&b)
        .events()
        .into_iter()
        .filter(|e| matches!(e, Event::Bounds(_)))
        .count();
    assert_eq!(a_bounds, 0);
    assert_eq!(b_bounds, 1);
}
