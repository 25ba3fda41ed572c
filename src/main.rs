// src/main.rs

use std::sync::Arc;

use actix::Actor;
use actix_cors::Cors;
use actix_files::Files;
use actix_web::{http, middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::{error, info, warn};

use collabmate::ai::{AiProvider, HttpAiProvider, OfflineAiProvider};
use collabmate::app_state::AppState;
use collabmate::chat_server::ChatServer;
use collabmate::config::{Config, StoreBackend};
use collabmate::error::{json_error_handler, path_error_handler, query_error_handler};
use collabmate::middleware::Authentication;
use collabmate::store::{MemoryStore, MongoStore, Store};
use collabmate::web_socket_server::ws_index;

fn ai_provider(config: &Config) -> Arc<dyn AiProvider> {
    match config.ai_endpoint() {
        Some(url) => match HttpAiProvider::new(url) {
            Ok(provider) => {
                info!("AI provider: {}", url);
                Arc::new(provider)
            }
            Err(e) => {
                warn!("AI provider unavailable ({}), using offline fallback", e);
                Arc::new(OfflineAiProvider)
            }
        },
        None => {
            info!("No AI endpoint configured, using offline fallback");
            Arc::new(OfflineAiProvider)
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let store: Arc<dyn Store> = match (&config.store_backend, &config.mongo_uri) {
        (StoreBackend::Mongo, Some(uri)) => match MongoStore::init(uri, &config.database_name).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!("Failed to connect to MongoDB: {}", e);
                std::process::exit(1);
            }
        },
        _ => {
            warn!("Using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    std::fs::create_dir_all(&config.upload_dir)?;

    let ai = ai_provider(&config);
    let chat_server = ChatServer::new().start();

    info!("Server running at http://{}", config.bind_addr);
    info!("Allowed CORS Origin: {}", config.frontend_origin);

    let bind_addr = config.bind_addr.clone();
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&config.frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Authentication::new(&config.jwt_secret))
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(web::Data::new(AppState {
                chat_server: chat_server.clone(),
                store: store.clone(),
                ai: ai.clone(),
                config: config.clone(),
            }))
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::QueryConfig::default().error_handler(query_error_handler))
            .app_data(web::PathConfig::default().error_handler(path_error_handler))
            .configure(collabmate::configure_api)
            // WEBSOCKET route for real-time
            .service(web::resource("/ws").route(web::get().to(ws_index)))
            .service(Files::new("/uploads", &config.upload_dir))
    })
    .bind(bind_addr)?
    .run()
    .await
}
