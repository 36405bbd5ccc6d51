use clap::Parser as _;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let args = tsz_cli::CliArgs::parse();
    let code = tsz_cli::run(&args)?;
    std::process::exit(code);
}
