//! End-to-end scenarios against an in-process master KME (§8 A, C, F).

use actix_web::{test, web, App};
use kme::config::{KmeConfig, Role};
use kme::routes;
use kme::state::AppState;
use serde_json::{json, Value};
use std::time::Duration;

fn master_config(max_key_count: usize, acquire_timeout: Duration) -> KmeConfig {
    KmeConfig {
        kme_id: "1".to_string(),
        role: Role::Master,
        attached_sae_id: "SAE_DIRECT".to_string(),
        default_key_size_bytes: 32,
        max_key_count,
        max_keys_per_request: 10,
        min_key_size_bits: 64,
        max_key_size_bits: 8192,
        batch_size: 10,
        refill_threshold: 0,
        generate_interval: Duration::from_secs(3600),
        acquire_timeout,
        use_https: false,
        peer_base_url: None,
        persistence_path: format!("/tmp/kme-scenario-{}.json", uuid::Uuid::new_v4()),
        bind_addr: "127.0.0.1:0".to_string(),
    }
}

#[actix_web::test]
async fn scenario_a_happy_path_enc_then_dec() {
    let config = master_config(5, Duration::from_secs(1));
    let state = AppState::build(config).await;
    state.shared_pool.as_ref().unwrap().add_keys_batch(5).await;
    let data = web::Data::new(state);

    let app = test::init_service(App::new().app_data(data.clone()).configure(routes::configure)).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/keys/SLV/enc_keys")
        .insert_header(("X-SAE-ID", "MST"))
        .set_json(json!({"number": 2, "size": 256}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    let keys = body["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 2);
    let k1 = keys[0]["key_ID"].as_str().unwrap().to_string();
    let k2 = keys[1]["key_ID"].as_str().unwrap().to_string();
    assert_ne!(k1, k2);

    let req = test::TestRequest::post()
        .uri("/api/v1/keys/MST/dec_keys")
        .insert_header(("X-SAE-ID", "SLV"))
        .set_json(json!({"key_IDs": [{"key_ID": k1}, {"key_ID": k2}]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["keys"].as_array().unwrap().len(), 2);

    // A second identical dec_keys is a 404: one-time use.
    let req = test::TestRequest::post()
        .uri("/api/v1/keys/MST/dec_keys")
        .insert_header(("X-SAE-ID", "SLV"))
        .set_json(json!({"key_IDs": [{"key_ID": k1}, {"key_ID": k2}]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn scenario_c_pool_timeout_returns_503_with_no_key_store_entry() {
    let config = master_config(1, Duration::from_millis(200));
    let state = AppState::build(config).await;
    state.shared_pool.as_ref().unwrap().add_keys_batch(1).await;
    // drain the single key directly so enc_keys has nothing left to reserve
    state
        .shared_pool
        .as_ref()
        .unwrap()
        .get_keys(1, "drain", Duration::from_secs(1), true)
        .await;
    let data = web::Data::new(state);

    let app = test::init_service(App::new().app_data(data.clone()).configure(routes::configure)).await;

    let started = std::time::Instant::now();
    let req = test::TestRequest::post()
        .uri("/api/v1/keys/SLV/enc_keys")
        .insert_header(("X-SAE-ID", "MST"))
        .set_json(json!({"number": 1}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 503);
    assert!(started.elapsed() < Duration::from_secs(2));

    let req = test::TestRequest::get()
        .uri("/api/v1/keys/SLV/status")
        .insert_header(("X-SAE-ID", "MST"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["stored_key_count"], 0);
}

#[actix_web::test]
async fn scenario_f_partial_dec_keys_returns_206() {
    let config = master_config(5, Duration::from_secs(1));
    let state = AppState::build(config).await;
    state.shared_pool.as_ref().unwrap().add_keys_batch(5).await;
    let data = web::Data::new(state);

    let app = test::init_service(App::new().app_data(data.clone()).configure(routes::configure)).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/keys/SLV/enc_keys")
        .insert_header(("X-SAE-ID", "MST"))
        .set_json(json!({"number": 1}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(resp).await;
    let present_id = body["keys"][0]["key_ID"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/api/v1/keys/MST/dec_keys")
        .insert_header(("X-SAE-ID", "SLV"))
        .set_json(json!({"key_IDs": [{"key_ID": present_id}, {"key_ID": "never-existed"}]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 206);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["keys"].as_array().unwrap().len(), 1);
    assert!(body["message"].as_str().unwrap().contains("missing"));
}
