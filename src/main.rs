use clap::Parser;
use packflow::app::{run, CliArgs};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    if let Err(e) = run(args).await {
        eprintln!("packflow: {}", e);
        std::process::exit(1);
    }
}
