use std::sync::Arc;

use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use env_logger::Env;
use log::info;

use mailgate::config::Settings;
use mailgate::provider::dev::DevProvider;
use mailgate::services::ServicesRegistry;
use mailgate::web::routes::configure_routes;
use mailgate::web::session::HttpSessionStore;
use mailgate::web::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config_path = std::env::var("MAILGATE_CONFIG").ok();
    let settings = Settings::new(config_path.as_deref())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    // Initialize logger
    env_logger::Builder::from_env(Env::default().default_filter_or(&settings.log.level)).init();

    let provider = Arc::new(DevProvider::from_settings(&settings));
    let state = AppState {
        settings: Arc::new(settings.clone()),
        provider,
        registry: Arc::new(ServicesRegistry::new()),
        sessions: Arc::new(HttpSessionStore::new()),
    };

    info!(
        "starting mailgate for provider {} at http://{}:{}",
        settings.provider.hostname, settings.server.host, settings.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(configure_routes)
    })
    .bind((settings.server.host.as_str(), settings.server.port))?
    .run()
    .await
}
