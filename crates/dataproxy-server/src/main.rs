use clap::Parser;
use dataproxy_server::ServerBuilder;
use dataproxy_server::config::loader::{DEFAULT_CONFIG_PATH, load_config};

#[derive(Debug, Parser)]
#[command(name = "dataproxy-server", version, about = "GraphQL data proxy for ORM clients")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "DATAPROXY_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,
}

#[tokio::main]
async fn main() {
    // .env is optional
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    dataproxy_server::observability::init_tracing();

    let cli = Cli::parse();
    let cfg = match load_config(Some(&cli.config)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };
    dataproxy_server::observability::apply_logging_level(&cfg.logging.level);
    tracing::info!(path = %cli.config, "Configuration loaded");

    let server = match ServerBuilder::new().with_config(cfg).build().await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Server initialization failed: {e:#}");
            std::process::exit(2);
        }
    };

    if let Err(err) = server.run().await {
        eprintln!("Server error: {err:#}");
        std::process::exit(1);
    }
}
