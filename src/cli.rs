use clap::Parser;

#[derive(Parser)]
#[command(version, about = "Compile proxy links into a sing-box config", long_about = None)]
pub struct Args {
    #[arg(short, long, help = "Render config, accept file path or URL")]
    pub render: String,

    #[arg(short, long, help = "Emit debug log")]
    pub verbose: bool,

    #[arg(short, long, help = "Override the configured output path ('-' for stdout)")]
    pub output: Option<String>,
}
