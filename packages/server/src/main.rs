#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Entry point for the hotspot map API server.

use std::path::PathBuf;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use hotspot_server::{AppState, handlers};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let data_dir: PathBuf = std::env::var("DATA_DIR")
        .unwrap_or_else(|_| "data".to_string())
        .into();

    log::info!("Loading crime data from {}...", data_dir.display());
    let (records, fields) = hotspot_ingest::load_crime_data(&data_dir)
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    log::info!("Working set: {} records", records.len());

    let state = web::Data::new(AppState { records, fields });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(handlers::health))
                    .route("/fields", web::get().to(handlers::fields))
                    .route("/cluster", web::post().to(handlers::cluster))
                    .route("/forecast", web::post().to(handlers::forecast))
                    .route("/anomalies", web::post().to(handlers::anomalies)),
            )
    })
    .bind((bind_addr.as_str(), port))?
    .run()
    .await
}
