use anyhow::Result;
use beacon::app::ApplicationBuilder;
use beacon::config::CheckArgs;
use beacon::config::Cli;
use beacon::config::Commands;
use beacon::config::Config;
use beacon::config::RunArgs;
use beacon::logging;
use beacon::platform::SysinfoSource;
use beacon::registry::Registry;
use clap::Parser;
use utils::version;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(run_args) => run(run_args).await,
        Commands::Check(check_args) => check(check_args),
    }
}

async fn run(run_args: RunArgs) -> Result<()> {
    let _guard = logging::init(run_args.broadcast_file.as_deref())?;

    tracing::info!("Starting hostbeacon {}", &**version::VERSION);

    let app = ApplicationBuilder::new(run_args).build()?;
    app.run().await?;

    Ok(())
}

fn check(check_args: CheckArgs) -> Result<()> {
    utils::logging::init();

    let config = Config::load(&check_args.config)
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e:?}"))?;
    let source = SysinfoSource::new();
    let registry = Registry::expand(&config.metrics, &source);

    println!(
        "{}: {} definitions, {} instances, check frequency {:?}",
        check_args.config.display(),
        config.metrics.len(),
        registry.len(),
        config.check_frequency
    );
    for instance in registry.iter() {
        println!(
            "  {:<24} {:<32} {}",
            instance.name(),
            instance.probe().to_string(),
            instance.thresholds()
        );
    }
    Ok(())
}
