mod handlers;
mod middleware;
mod models;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;

use services::cache::CacheService;
use services::credit_gate::CreditGate;
use services::image_model::{GeminiImageModel, ImageModel};
use services::kv_store::{KeyValueStore, MemoryStore, RedisStore};
use services::object_store::{LocalObjectStore, ObjectStore};
use services::sheet_generator::SheetGenerator;
use utils::config::Config;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file FIRST before anything else
    dotenv::dotenv().ok();

    // Initialize logger with default level if RUST_LOG not set
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=================================================");
    println!("🚀 ArtSheet Backend Server");
    println!("=================================================");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    let host = config.host.clone();
    let port = config.port;

    println!("📝 Configuration loaded:");
    println!("   - Host: {}", host);
    println!("   - Port: {}", port);
    println!(
        "   - Cache: {}",
        match &config.redis_url {
            Some(url) => format!("Redis ({})", url.split('@').last().unwrap_or("***")),
            None => "in-memory (REDIS_URL not set)".to_string(),
        }
    );
    println!("   - Storage: {}", config.storage_dir.display());
    println!("   - Public files: {}", config.public_base_url);
    println!("   - Image model: {}", config.gemini_model);
    println!("   - Starting credits: {}", config.default_credits);
    println!(
        "   - Log level: {}",
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
    );

    // Key-value store for cache, credits, usage, locks and rate limits
    let kv_store: Arc<dyn KeyValueStore> = match &config.redis_url {
        Some(url) => Arc::new(RedisStore::new(url).context("Invalid REDIS_URL")?),
        None => {
            log::warn!("REDIS_URL not set, cache and credits are kept in process memory");
            Arc::new(MemoryStore::new())
        }
    };
    let cache = Arc::new(CacheService::new(kv_store, config.default_credits as i64));

    print!("📂 Preparing storage directory... ");
    tokio::fs::create_dir_all(&config.storage_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.storage_dir.display()))?;
    println!("✅ Ready!");

    let object_store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(
        config.storage_dir.clone(),
        &config.public_base_url,
        &config.jwt_secret,
    ));

    let http_client = utils::http_client::create_http_client().context("Failed to create HTTP client")?;
    let image_model: Arc<dyn ImageModel> = Arc::new(GeminiImageModel::new(
        http_client,
        &config.gemini_api_key,
        &config.gemini_api_base,
        &config.gemini_model,
    ));

    let generator = web::Data::new(SheetGenerator::new(
        image_model,
        object_store.clone(),
        cache.clone(),
        &config.watermark_text,
    ));
    let credit_gate = web::Data::new(CreditGate::new(cache.clone()));
    let cache = web::Data::from(cache);
    let object_store: web::Data<dyn ObjectStore> = web::Data::from(object_store);

    // Start HTTP server
    println!("🌐 Starting HTTP server at http://{}:{}", host, port);
    println!("📍 Available endpoints:");
    println!("   - POST http://{}:{}/api/generate (JWT required)", host, port);
    println!("   - POST http://{}:{}/api/generate/batch (JWT required)", host, port);
    println!("   - GET  http://{}:{}/api/credits (JWT required)", host, port);
    println!("   - GET  http://{}:{}/api/usage (JWT required)", host, port);
    println!("   - GET  http://{}:{}/api/catalog", host, port);
    println!("   - GET  http://{}:{}/api/files/signed-url (JWT required)", host, port);
    println!("   - GET  http://{}:{}/files/{{key}}", host, port);
    println!("=================================================");

    log::info!("Server started at http://{}:{}", host, port);

    let app_config = web::Data::new(config.clone());
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&config.frontend_url)
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::ACCEPT,
                actix_web::http::header::CONTENT_TYPE,
            ])
            .max_age(3600);

        App::new()
            .app_data(app_config.clone())
            .app_data(cache.clone())
            .app_data(credit_gate.clone())
            .app_data(generator.clone())
            .app_data(object_store.clone())
            .wrap(Logger::default())
            .wrap(cors) // CORS must be wrapped AFTER Logger to ensure headers are added to all responses
            .configure(handlers::configure)
    })
    .bind((host.as_str(), port))
    .with_context(|| format!("Failed to bind {}:{}", host, port))?
    .run()
    .await?;

    Ok(())
}
