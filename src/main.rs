use actix_web::HttpServer;
use forecastly::{AppState, LogFormat, LoggingConfig, ServerConfig, create_app};
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.format {
        LogFormat::Json => builder.json().with_current_span(false).init(),
        LogFormat::Text => builder.init(),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_tracing(&LoggingConfig::from_env());

    let server_config = ServerConfig::from_env();
    let state = AppState::from_env().map_err(std::io::Error::other)?;

    if state.fetcher.config().api_key.is_none() {
        tracing::warn!("OPENWEATHER_API_KEY is not set; forecast requests will fail validation");
    }

    tracing::info!(
        bind_address = %server_config.bind_address,
        openweather = ?state.fetcher.config(),
        "Starting server"
    );

    HttpServer::new(move || create_app(&state))
        .bind(&server_config.bind_address)?
        .run()
        .await
}
