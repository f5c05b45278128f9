pub mod admin;
pub mod health;
pub mod keys;
pub mod register;
pub mod sync;

use actix_web::web;

/// ETSI-shaped surface at `/api/v1/user-keys`; registration/admin/sync at
/// the root, matching §6's mount points for the Local KM variant.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/user-keys")
            .route("/{sae_id}/status", web::get().to(keys::status))
            .route("/{sae_id}/enc_keys", web::post().to(keys::enc_keys))
            .route("/{sae_id}/enc_keys", web::get().to(keys::enc_keys_query))
            .route("/{sae_id}/dec_keys", web::post().to(keys::dec_keys))
            .route("/{sae_id}/dec_keys", web::get().to(keys::dec_keys_query)),
    )
    .route("/register", web::post().to(register::register))
    .route("/{sae_id}/refill", web::post().to(admin::refill))
    .route("/pools", web::get().to(admin::pools))
    .route("/sync", web::post().to(sync::sync))
    .route("/healthz", web::get().to(health::healthz));
}
