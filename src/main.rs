use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use clap::Parser;
use tracing::info;

use splitsmart::config::{Config, StorageConfig};
use splitsmart::repository::{MongoStore, Repositories};
use splitsmart::service::SplitService;
use splitsmart::{routes, telemetry};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    telemetry::init(config.log_json);

    let repos = match config.storage()? {
        StorageConfig::Memory => {
            info!("using in-memory storage");
            Repositories::in_memory()
        }
        StorageConfig::Mongo { uri, database } => {
            let store = MongoStore::connect(&uri, &database).await?;
            info!(%database, "connected to MongoDB");
            Repositories::mongo(store)
        }
    };

    let service = web::Data::new(SplitService::new(repos));
    let origins = config.cors_origins();

    info!(bind = %config.bind, "SplitSmart API listening");
    HttpServer::new(move || {
        let cors = origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allow_any_method()
            .allow_any_header()
            .supports_credentials();

        App::new()
            .wrap(Logger::default())
            .wrap(routes::security_headers())
            .wrap(cors)
            .app_data(service.clone())
            .configure(routes::configure)
    })
    .bind(config.bind.as_str())?
    .run()
    .await?;

    Ok(())
}
