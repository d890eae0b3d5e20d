use mediastream::{LogFormat, MediaServerApi, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    let _ = dotenv::dotenv();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(config.log_format);

    let server = match MediaServerApi::from_config(&config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start media server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.serve(&config.bind_addr()).await {
        tracing::error!("Media server error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
