// CLI modules
mod cli;
mod config;
mod records;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Demo, Init, Records, Scalability};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

command_enum! {
    (Demo, Demo),
    (Init, Init),
    (Records, Records),
    (Scalability, Scalability),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Logs go to stderr so command output on stdout stays clean
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stderr());
    let log_level: tracing::Level = args.log_level.parse().unwrap_or(tracing::Level::WARN);
    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(non_blocking_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(stderr_layer).init();

    let ctx = cli::op::OpContext::new(args.config);

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            drop(guard);
            std::process::exit(1);
        }
    }
}
