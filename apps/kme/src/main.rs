use actix_web::{web, App, HttpServer};
use kme::config::KmeConfig;
use kme::middleware::{RequestTrace, StructuredLogger};
use kme::state::AppState;
use kme::{routes, telemetry};
use tracing::info;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    telemetry::init_tracing();

    let config = KmeConfig::from_env().unwrap_or_else(|e| {
        eprintln!("invalid configuration: {e}");
        std::process::exit(1);
    });

    info!(kme_id = %config.kme_id, role = ?config.role, "starting KME");

    let bind_addr = config.bind_addr.clone();
    let app_state = AppState::build(config).await;

    if let (true, Some(pool)) = (app_state.is_master(), app_state.shared_pool.clone()) {
        info!("master role: spawning shared-pool refill loop");
        tokio::spawn(pool.run_refill_loop());
    }

    let data = web::Data::new(app_state);

    HttpServer::new(move || {
        App::new()
            .wrap(RequestTrace)
            .wrap(StructuredLogger)
            .app_data(data.clone())
            .configure(routes::configure)
    })
    .bind(bind_addr.as_str())?
    .run()
    .await
}
