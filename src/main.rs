use std::path::Path;

use anyhow::Context;
use clap::Parser;

use coderun::config::{CliArgs, Command, Config, language_for};
use coderun::engine::Engine;
use coderun::web_server::build_server;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();
    let config = cli.to_config().context("Failed to load configuration")?;

    match cli.command {
        Some(Command::Run {
            file,
            language,
            stdin,
        }) => run_file(config, &file, language, stdin.as_deref()).await,
        Some(Command::Serve) | None => serve(config).await,
    }
}

async fn run_file(
    config: Config,
    file: &Path,
    language: Option<String>,
    stdin: Option<&Path>,
) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let stdin = match stdin {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => String::new(),
    };
    let language = language.unwrap_or_else(|| language_for(file));

    let engine = Engine::new(config.engine);
    let result = engine.execute(&source, &language, &stdin).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let server = build_server(config).context("Failed to build server")?;
    let server_handle = server.handle();
    let server_task = actix_web::rt::spawn(server);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("Ctrl-c received, shutting down...");
        }
        res_server = server_task => {
            log::error!("Server terminated unexpectedly: {:?}", res_server);
        }
    }

    server_handle.stop(true).await;
    log::info!("Shutdown complete");
    Ok(())
}
