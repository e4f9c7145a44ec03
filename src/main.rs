use clap::Parser;
use runway::api::{Cli, run};
use runway::logging;

#[tokio::main]
async fn main() {
    logging::init_tracing();
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
