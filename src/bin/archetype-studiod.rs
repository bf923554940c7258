use std::path::PathBuf;

use archetype_studio::config::{Config, StorageConfig};
use archetype_studio::daemon;
use archetype_studio::error::Result;
use archetype_studio::runtime_paths;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "archetype-studiod")]
#[command(about = "Archetype Studio local daemon")]
struct Cli {
    #[arg(long, env = "STUDIO_HOST")]
    host: Option<String>,

    #[arg(long, env = "STUDIO_PORT")]
    port: Option<u16>,

    #[arg(long, env = "STUDIO_DB")]
    db: Option<String>,

    #[arg(long, env = "STUDIO_CONFIG")]
    config: Option<String>,

    /// Root for the default database, config and secrets paths
    #[arg(long, env = "STUDIO_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    archetype_studio::logging::init_tracing("archetype_studiod");
    let cli = Cli::parse();
    if cli.data_dir.is_some() {
        runtime_paths::set_app_root_override(cli.data_dir.clone());
    }

    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(runtime_paths::default_db_path);
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(runtime_paths::default_config_path);
    let mut config = Config::load_or_default(Some(&config_path), &db_path)?;
    if cli.db.is_some() {
        config.storage = Some(StorageConfig {
            sqlite_path: Some(db_path),
        });
    }

    let server = config.server.clone().unwrap_or_default();
    let host = cli
        .host
        .or(server.host)
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = cli.port.or(server.port).unwrap_or(7979);
    let token = archetype_studio::vault::ensure_daemon_auth_token(server.token.as_deref())?;

    daemon::run(&host, port, &config, &token).await
}
