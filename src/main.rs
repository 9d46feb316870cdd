mod provider;
mod relay;
mod web;

use std::env;
use std::sync::Arc;

use actix_files as fs;
use actix_web::{web::Data, App, HttpServer};
use dotenv::dotenv;
use log::{error, info};
use tera::Tera;

use provider::{CompletionProvider, OpenAiClient};
use relay::Defaults;
use web::routes;

// App state structure
pub struct AppState {
    tera: Tera,
    provider: Arc<dyn CompletionProvider>,
    defaults: Defaults,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting chat relay web application");

    // Initialize the completion provider client, once for the process.
    // A missing credential is fatal at boot, never discovered per request.
    let provider: Arc<dyn CompletionProvider> = match OpenAiClient::from_env() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to initialize completion provider: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize template engine
    let mut tera = match Tera::new("templates/**/*") {
        Ok(t) => t,
        Err(e) => {
            error!("Template parsing error: {}", e);
            std::process::exit(1);
        }
    };
    tera.autoescape_on(vec![".html", ".sql"]);

    let defaults = Defaults::from_env();
    info!("Default model: {}", defaults.model);

    // Create app state
    let app_state = Data::new(AppState {
        tera,
        provider,
        defaults,
    });

    let port = env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(8000);

    // Start web server
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(routes::configure)
            .service(fs::Files::new("/static", "./static"))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
