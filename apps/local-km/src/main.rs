use actix_web::{web, App, HttpServer};
use local_km::config::LocalKmConfig;
use local_km::middleware::{RequestTrace, StructuredLogger};
use local_km::state::AppState;
use local_km::{routes, telemetry};
use tracing::info;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    telemetry::init_tracing();

    let config = LocalKmConfig::from_env().unwrap_or_else(|e| {
        eprintln!("invalid configuration: {e}");
        std::process::exit(1);
    });

    info!(local_km_id = %config.local_km_id, upstream = %config.upstream_url, "starting Local KM");

    let bind_addr = config.bind_addr.clone();
    let app_state = AppState::build(config).await.unwrap_or_else(|e| {
        eprintln!("failed to initialize Local KM state: {e}");
        std::process::exit(1);
    });

    let worker = app_state.sync_worker.clone();
    tokio::spawn(worker.run());

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
