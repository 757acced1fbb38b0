use color_eyre::eyre::{
    Result,
    WrapErr,
};
use lottery_client::{
    app,
    config::{
        self,
        AppConfig,
        ChainConfig,
        CliCommand,
    },
};
use std::sync::OnceLock;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn init_tracing(config: &AppConfig) -> Result<()> {
    std::fs::create_dir_all(&config.log_dir)
        .wrap_err_with(|| format!("failed to create log dir {}", config.log_dir.display()))?;
    let appender = rolling::daily(&config.log_dir, "lottery-client.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let chain = ChainConfig::from_build_env()?;
    let config = match config::parse_cli_args(std::env::args().skip(1), chain)? {
        CliCommand::Run(config) => config,
        CliCommand::Help => {
            println!("{}", config::usage());
            return Ok(());
        }
    };
    init_tracing(&config)?;
    app::run_app(config).await
}
