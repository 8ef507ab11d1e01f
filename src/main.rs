use clap::Parser;
use taxwise::api::{Cli, Command, run_evaluate, run_http_server};
use tracing::error;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Command::Serve(args) => {
            if let Err(e) = run_http_server(args).await {
                error!("Server error: {e}");
                std::process::exit(1);
            }
        }
        Command::Evaluate(args) => match run_evaluate(args) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        },
    }
}
