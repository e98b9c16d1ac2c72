//! End-to-end seed scenarios (spec.md §8) driven through the HTTP surface
//! against an in-process `actix-web` test server, per SPEC_FULL.md §8's
//! ambient test-tooling note.

use actix_web::{
    test::{call_service, init_service, read_body_json, TestRequest},
    web, App,
};
use common_lib::types::{DynamicResourceLifeCycle, Resource};
use core_engine::{ConfigLoader, DynamicResourceUpdater, Ledger, SystemClock, TestClock};
use rest::{handlers, state::AppState};
use std::{collections::HashMap, sync::Arc, time::Duration as StdDuration};
use store::memory::MemoryStore;

fn test_state(ledger: Arc<Ledger>) -> web::Data<AppState> {
    let state = web::Data::new(AppState::new(ledger));
    state.mark_hydrated();
    state
}

async fn new_ledger_with_clock(clock: TestClock) -> Arc<Ledger> {
    let store = Arc::new(MemoryStore::new());
    let ledger = Ledger::new(store, Arc::new(clock), chrono::Duration::seconds(30));
    ledger.hydrate().await.unwrap();
    Arc::new(ledger)
}

async fn new_ledger() -> Arc<Ledger> {
    let store = Arc::new(MemoryStore::new());
    let ledger = Ledger::new(store, Arc::new(SystemClock), chrono::Duration::seconds(30));
    ledger.hydrate().await.unwrap();
    Arc::new(ledger)
}

/// Scenario 1: basic lease — acquire then release round-trips through
/// owner/state correctly.
#[actix_web::test]
async fn basic_lease_cycle() {
    let ledger = new_ledger().await;
    ledger
        .create_resource(Resource::new("p1", "project", "free", chrono::Utc::now()))
        .await
        .unwrap();
    let state = test_state(ledger);
    let app = init_service(App::new().app_data(state.clone()).configure(handlers::configure)).await;

    let req = TestRequest::post()
        .uri("/acquire?type=project&state=free&dest=busy&owner=alice&request_id=r1")
        .to_request();
    let resp = call_service(&app, req).await;
    assert!(resp.status().is_success(), "expected 200, got {}", resp.status());
    let acquired: Resource = read_body_json(resp).await;
    assert_eq!(acquired.name, "p1");
    assert_eq!(acquired.owner, "alice");
    assert_eq!(acquired.state, "busy");

    let req = TestRequest::post()
        .uri("/release?name=p1&dest=dirty&owner=alice")
        .to_request();
    let resp = call_service(&app, req).await;
    assert!(resp.status().is_success());

    let after = state.ledger.get_resource("p1").unwrap();
    assert_eq!(after.owner, "");
    assert_eq!(after.state, "dirty");
}

/// Scenario 4: Release with the wrong owner is rejected and leaves the
/// resource untouched.
#[actix_web::test]
async fn wrong_owner_release_is_unauthorized() {
    let ledger = new_ledger().await;
    ledger
        .create_resource(Resource::new("p1", "project", "free", chrono::Utc::now()))
        .await
        .unwrap();
    let state = test_state(ledger);
    let app = init_service(App::new().app_data(state.clone()).configure(handlers::configure)).await;

    let req = TestRequest::post()
        .uri("/acquire?type=project&state=free&dest=busy&owner=alice&request_id=r1")
        .to_request();
    let resp = call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = TestRequest::post()
        .uri("/release?name=p1&dest=dirty&owner=bob")
        .to_request();
    let resp = call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let still = state.ledger.get_resource("p1").unwrap();
    assert_eq!(still.owner, "alice");
    assert_eq!(still.state, "busy");
}

/// Scenario 2: queueing — a requester that arrives after every free
/// resource is taken is enqueued (404) and granted once one is released.
#[actix_web::test]
async fn third_requester_is_queued_then_served_after_release() {
    let ledger = new_ledger().await;
    ledger
        .create_resource(Resource::new("p1", "project", "free", chrono::Utc::now()))
        .await
        .unwrap();
    let state = test_state(ledger);
    let app = init_service(App::new().app_data(state.clone()).configure(handlers::configure)).await;

    let req = TestRequest::post()
        .uri("/acquire?type=project&state=free&dest=busy&owner=alice&request_id=r1")
        .to_request();
    assert!(call_service(&app, req).await.status().is_success());

    // r2 arrives to find nothing free: enqueued, not granted.
    let req = TestRequest::post()
        .uri("/acquire?type=project&state=free&dest=busy&owner=bob&request_id=r2")
        .to_request();
    let resp = call_service(&app, req).await;
    assert_eq!(resp.status(), 404);

    // alice releases back to `free`; r2, now head of the queue, succeeds.
    let req = TestRequest::post()
        .uri("/release?name=p1&dest=free&owner=alice")
        .to_request();
    assert!(call_service(&app, req).await.status().is_success());

    let req = TestRequest::post()
        .uri("/acquire?type=project&state=free&dest=busy&owner=bob&request_id=r2")
        .to_request();
    let resp = call_service(&app, req).await;
    assert!(resp.status().is_success());
    let acquired: Resource = read_body_json(resp).await;
    assert_eq!(acquired.owner, "bob");
}

/// Scenario 3: the reaper's Reset endpoint reclaims a stale owner and is
/// idempotent on a second call with no intervening heartbeat.
#[actix_web::test]
async fn reset_endpoint_reaps_stale_owner_idempotently() {
    let t0 = chrono::Utc::now();
    let clock = TestClock::new(t0);
    let ledger = new_ledger_with_clock(clock.clone()).await;
    let mut p1 = Resource::new("p1", "project", "busy", t0);
    p1.owner = "alice".to_string();
    ledger.create_resource(p1).await.unwrap();
    let state = test_state(ledger);
    let app = init_service(App::new().app_data(state.clone()).configure(handlers::configure)).await;

    clock.advance(chrono::Duration::seconds(60));

    let req = TestRequest::post()
        .uri("/reset?type=project&state=busy&expire=30s&dest=dirty")
        .to_request();
    let resp = call_service(&app, req).await;
    assert!(resp.status().is_success());
    let reaped: HashMap<String, String> = read_body_json(resp).await;
    assert_eq!(reaped.get("p1").map(String::as_str), Some("alice"));

    let p1 = state.ledger.get_resource("p1").unwrap();
    assert_eq!(p1.owner, "");
    assert_eq!(p1.state, "dirty");

    // Idempotent: re-running with no intervening heartbeat yields nothing.
    let req = TestRequest::post()
        .uri("/reset?type=project&state=busy&expire=30s&dest=dirty")
        .to_request();
    let resp = call_service(&app, req).await;
    let reaped_again: HashMap<String, String> = read_body_json(resp).await;
    assert!(reaped_again.is_empty());
}

/// `GET /metric` reflects pool counts by state and owner.
#[actix_web::test]
async fn metric_reports_pool_counts() {
    let ledger = new_ledger().await;
    ledger
        .create_resource(Resource::new("p1", "project", "free", chrono::Utc::now()))
        .await
        .unwrap();
    ledger
        .create_resource(Resource::new("p2", "project", "free", chrono::Utc::now()))
        .await
        .unwrap();
    let state = test_state(ledger);
    let app = init_service(App::new().app_data(state.clone()).configure(handlers::configure)).await;

    let req = TestRequest::get().uri("/metric?type=project").to_request();
    let resp = call_service(&app, req).await;
    assert!(resp.status().is_success());
    let metric: serde_json::Value = read_body_json(resp).await;
    assert_eq!(metric["state"]["free"], 2);
}

/// Scenario 5: registering a DRLC for an empty pool scales it up to
/// `min_count`; verified by reading the pool back over `GET /metric`.
#[actix_web::test]
async fn dynamic_scale_up_is_visible_over_metric() {
    let ledger = new_ledger().await;
    ledger
        .upsert_lifecycle(DynamicResourceLifeCycle {
            resource_type: "tproj".to_string(),
            initial_state: "free".to_string(),
            min_count: 3,
            max_count: 5,
            life_span: None,
            config: None,
            version: 0,
        })
        .await
        .unwrap();

    let updater = DynamicResourceUpdater::new(ledger.clone(), Arc::new(SystemClock), StdDuration::from_secs(600));
    updater.tick_once().await;

    let state = test_state(ledger);
    let app = init_service(App::new().app_data(state.clone()).configure(handlers::configure)).await;

    let req = TestRequest::get().uri("/metric?type=tproj").to_request();
    let resp = call_service(&app, req).await;
    assert!(resp.status().is_success());
    let metric: serde_json::Value = read_body_json(resp).await;
    assert_eq!(metric["state"]["free"], 3);
}

/// Scenario 6: removing a static resource from config defers deletion while
/// it's busy, and applies once it's released back to free — driven end to
/// end through `/acquire` and `/release`, with the config reload itself
/// coming from a real file on disk via `ConfigLoader::load_once`.
#[actix_web::test]
async fn config_removal_defers_a_busy_resource() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("boskos.yaml");

    tokio::fs::write(
        &config_path,
        "resources:\n  - type: project\n    state: free\n    names: [p1]\n",
    )
    .await
    .unwrap();

    let ledger = new_ledger().await;
    let loader = ConfigLoader::new(ledger.clone(), config_path.clone(), StdDuration::from_secs(10));
    loader.load_once().await.unwrap();
    assert!(ledger.get_resource("p1").is_some());

    let state = test_state(ledger.clone());
    let app = init_service(App::new().app_data(state.clone()).configure(handlers::configure)).await;

    let req = TestRequest::post()
        .uri("/acquire?type=project&state=free&dest=busy&owner=alice&request_id=r1")
        .to_request();
    assert!(call_service(&app, req).await.status().is_success());

    // Config no longer declares p1, but it's busy: removal is deferred.
    tokio::fs::write(&config_path, "resources: []\n").await.unwrap();
    loader.load_once().await.unwrap();
    let req = TestRequest::get().uri("/metric?type=project").to_request();
    let resp = call_service(&app, req).await;
    let metric: serde_json::Value = read_body_json(resp).await;
    assert_eq!(metric["state"]["busy"], 1, "busy resource must survive config removal");

    // Released back to free, the next reload removes it.
    let req = TestRequest::post()
        .uri("/release?name=p1&dest=free&owner=alice")
        .to_request();
    assert!(call_service(&app, req).await.status().is_success());
    loader.load_once().await.unwrap();
    assert!(ledger.get_resource("p1").is_none(), "freed resource should now be removed");
}

#[actix_web::test]
async fn healthz_reports_hydrated_state() {
    let ledger = new_ledger().await;
    let state = web::Data::new(AppState::new(ledger));
    let app = init_service(App::new().app_data(state.clone()).configure(handlers::configure)).await;

    let req = TestRequest::get().uri("/healthz").to_request();
    let resp = call_service(&app, req).await;
    assert_eq!(resp.status(), 503);

    state.mark_hydrated();
    let req = TestRequest::get().uri("/healthz").to_request();
    let resp = call_service(&app, req).await;
    assert!(resp.status().is_success());
}
