use crate::{
    api::{attendance, cache, overview},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::web;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_else(GovernorConfig::default);
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let protected_limiter = build_limiter(config.rate_protected_per_min);

    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("")
                            .route(web::post().to(attendance::mark_attendance))
                            .route(web::get().to(attendance::list_attendance)),
                    )
                    // /attendance/bulk
                    .service(
                        web::resource("/bulk").route(web::post().to(attendance::bulk_mark_attendance)),
                    )
                    // /attendance/overview
                    .service(web::resource("/overview").route(web::get().to(overview::get_overview))),
            )
            .service(
                web::scope("/cache")
                    .service(web::resource("").route(web::delete().to(cache::flush_cache)))
                    .service(web::resource("/stats").route(web::get().to(cache::cache_stats))),
            ),
    );
}
