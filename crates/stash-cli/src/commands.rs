use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::Context;
use colored::Colorize;
use stash_server::{ServerConfig, StashServer, CONFIG_PATH_ENV};
use tracing::{error, info, Level};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args, cli.verbose),
        Command::CheckConfig(args) => cmd_check_config(args),
    }
}

/// Explicit flag first, then the environment variable.
fn resolve_config_path(flag: Option<PathBuf>, env: Option<OsString>) -> Option<PathBuf> {
    flag.or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
}

fn load_config(flag: Option<PathBuf>) -> anyhow::Result<(ServerConfig, Option<PathBuf>)> {
    match resolve_config_path(flag, std::env::var_os(CONFIG_PATH_ENV)) {
        Some(path) => {
            let config = ServerConfig::load(&path)?;
            Ok((config, Some(path)))
        }
        None => Ok((ServerConfig::default(), None)),
    }
}

fn init_logging(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn cmd_serve(args: ServeArgs, verbose: bool) -> anyhow::Result<()> {
    let (mut config, source) = load_config(args.config)?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    init_logging(verbose || config.is_dev());
    match &source {
        Some(path) => info!(path = %path.display(), env = %config.env, "configuration loaded"),
        None => info!("no configuration file given, using defaults"),
    }

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(async move {
        if args.create_dirs {
            create_storage_dirs(&config).await?;
        }
        let server = StashServer::open(config)
            .await
            .context("failed to open artifact store")?;
        server.serve(shutdown_signal()).await?;
        Ok(())
    })
}

async fn create_storage_dirs(config: &ServerConfig) -> anyhow::Result<()> {
    for dir in [&config.storage.staging_path, &config.storage.completed_path] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown requested, draining in-flight requests");
}

fn cmd_check_config(args: CheckConfigArgs) -> anyhow::Result<()> {
    let (config, source) = load_config(args.config)?;
    print!("{}", render_config_report(&config, source.as_deref())?);
    Ok(())
}

fn render_config_report(config: &ServerConfig, source: Option<&Path>) -> anyhow::Result<String> {
    let origin = match source {
        Some(path) => path.display().to_string(),
        None => "built-in defaults".to_string(),
    };
    let mut out = format!("{} Configuration valid ({})\n\n", "✓".green().bold(), origin.bold());
    out.push_str(&config.to_toml_string()?);
    Ok(out)
}
