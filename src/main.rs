use clap::Parser;
use rentgate::cli::{Args, build_config, init_logging, load_session_secret};
use rentgate::run_server;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let session_secret = match load_session_secret(args.session_secret_file.as_deref()) {
        Ok(secret) => secret,
        Err(e) => {
            error!(error = %e, "Invalid session secret");
            std::process::exit(1);
        }
    };

    let config = match build_config(&args, session_secret) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, api = %config.api_base, "Listening"),
        Err(e) => info!(address = %addr, error = %e, "Listening"),
    }

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
