#![warn(clippy::all)]
#![warn(clippy::style)]

use clap::Parser;
use switchboard::cli::Args;
use switchboard::render::Renderer;
use tracing::Level;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            Level::TRACE
        } else {
            Level::INFO
        })
        .init();

    if let Err(e) = run(args).await {
        tracing::error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    tracing::info!("Loading render config from: {}", args.render);

    let renderer = Renderer::load(&args.render).await?;

    renderer.render_to_file(args.output.as_deref()).await?;

    tracing::info!("Config render complete!");
    Ok(())
}
