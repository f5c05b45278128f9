//! End-to-end scenarios against an in-process Local KM (§8 D and adjacent).

use actix_web::{test, web, App};
use local_km::config::LocalKmConfig;
use local_km::routes;
use local_km::state::AppState;
use serde_json::{json, Value};
use std::time::Duration;

fn test_config() -> LocalKmConfig {
    LocalKmConfig {
        local_km_id: "local-km-test".to_string(),
        upstream_url: "http://127.0.0.1:1".to_string(),
        sync_interval: Duration::from_secs(3600 * 24),
        low_threshold_percent: 0.10,
        emergency_threshold_percent: 0.05,
        db_path: std::env::temp_dir()
            .join(format!("local-km-test-{}.sqlite3", uuid::Uuid::new_v4()))
            .to_string_lossy()
            .into_owned(),
        bind_addr: "127.0.0.1:0".to_string(),
    }
}

async fn build_state() -> AppState {
    let config = test_config();
    AppState::build(config).await.expect("state builds")
}

#[actix_web::test]
async fn register_then_enc_then_dec_keys() {
    let state = build_state().await;
    let data = web::Data::new(state);
    let app = test::init_service(App::new().app_data(data.clone()).configure(routes::configure)).await;

    let req = test::TestRequest::post()
        .uri("/register")
        .set_json(json!({"sae_id": "RECEIVER", "user_email": "r@example.test", "initial_pool_size": 5}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["keys_generated"], 5);

    let req = test::TestRequest::post()
        .uri("/api/v1/user-keys/RECEIVER/enc_keys")
        .insert_header(("X-SAE-ID", "SENDER"))
        .set_json(json!({"number": 2}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    let keys = body["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 2);
    let k1 = keys[0]["key_ID"].as_str().unwrap().to_string();

    // Sender can re-fetch by id (one-time-use means no transition back, not deletion).
    let req = test::TestRequest::post()
        .uri("/api/v1/user-keys/anything/dec_keys")
        .insert_header(("X-SAE-ID", "SENDER"))
        .set_json(json!({"key_IDs": [{"key_ID": k1.clone()}]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    // The receiver (pool owner) can also fetch the same key by id.
    let req = test::TestRequest::post()
        .uri("/api/v1/user-keys/anything/dec_keys")
        .insert_header(("X-SAE-ID", "RECEIVER"))
        .set_json(json!({"key_IDs": [{"key_ID": k1}]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    // An unrelated SAE cannot.
    let req = test::TestRequest::post()
        .uri("/api/v1/user-keys/anything/dec_keys")
        .insert_header(("X-SAE-ID", "STRANGER"))
        .set_json(json!({"key_IDs": [{"key_ID": "never-existed"}]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn enc_keys_past_pool_size_fails_insufficient() {
    let state = build_state().await;
    let data = web::Data::new(state);
    let app = test::init_service(App::new().app_data(data.clone()).configure(routes::configure)).await;

    test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/register")
            .set_json(json!({"sae_id": "RX", "user_email": "rx@example.test", "initial_pool_size": 2}))
            .to_request(),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/user-keys/RX/enc_keys")
        .insert_header(("X-SAE-ID", "TX"))
        .set_json(json!({"number": 5}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn duplicate_registration_is_rejected() {
    let state = build_state().await;
    let data = web::Data::new(state);
    let app = test::init_service(App::new().app_data(data.clone()).configure(routes::configure)).await;

    let body = json!({"sae_id": "DUP", "user_email": "dup@example.test"});
    let resp = test::call_service(
        &app,
        test::TestRequest::post().uri("/register").set_json(&body).to_request(),
    )
    .await;
    assert_eq!(resp.status(), 201);

    let resp = test::call_service(
        &app,
        test::TestRequest::post().uri("/register").set_json(&body).to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn refill_and_pools_admin_surface() {
    let state = build_state().await;
    let data = web::Data::new(state);
    let app = test::init_service(App::new().app_data(data.clone()).configure(routes::configure)).await;

    test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/register")
            .set_json(json!({"sae_id": "POOLED", "user_email": "p@example.test", "initial_pool_size": 3}))
            .to_request(),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/user-keys/POOLED/enc_keys")
        .insert_header(("X-SAE-ID", "OTHER"))
        .set_json(json!({"number": 3}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::post()
        .uri("/POOLED/refill")
        .set_json(json!({"keys_to_add": 2}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["keys_added"], 2);

    let req = test::TestRequest::get().uri("/pools").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["summary"]["total_users"], 1);
}
