pub mod enc_dec;
pub mod health;
pub mod internal;
pub mod status;

use actix_web::web;

/// SAE-facing surface is mounted at `/api/v1/keys`; internal peer endpoints
/// at `/internal`, matching §6's mount points.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/keys")
            .route("/mark_consumed", web::post().to(enc_dec::mark_consumed))
            .route("/{slave_sae}/status", web::get().to(status::status))
            .route("/{slave_sae}/enc_keys", web::post().to(enc_dec::enc_keys))
            .route("/{slave_sae}/enc_keys", web::get().to(enc_dec::enc_keys_query))
            .route("/{master_sae}/dec_keys", web::post().to(enc_dec::dec_keys))
            .route("/{master_sae}/dec_keys", web::get().to(enc_dec::dec_keys_query)),
    )
    .service(
        web::scope("/internal")
            .route("/get_shared_key", web::post().to(internal::get_shared_key))
            .route("/get_reserved_key", web::post().to(internal::get_reserved_key))
            .route("/kme_key_exchange", web::post().to(internal::kme_key_exchange))
            .route("/remove_kme_key", web::post().to(internal::remove_kme_key)),
    )
    .route("/healthz", web::get().to(health::healthz));
}
