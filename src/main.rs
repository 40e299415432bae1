use std::path::PathBuf;

use skybounce::{AppConfig, GameConfig};

const CONFIG_ENV: &str = "SKYBOUNCE_CONFIG";
const DEFAULT_CONFIG: &str = "skybounce.toml";

fn load_config() -> skybounce::Result<GameConfig> {
    let path = std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));

    if path.exists() {
        log::info!("Reading config from {}", path.display());
        Ok(GameConfig::from_file(&path)?)
    } else {
        log::info!("No config at {}, using defaults", path.display());
        Ok(GameConfig::default())
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let result = load_config().and_then(|game| skybounce::run(AppConfig::new().game(game)));

    if let Err(err) = result {
        log::error!("{err}");
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            log::error!("  caused by: {cause}");
            source = std::error::Error::source(cause);
        }
        std::process::exit(1);
    }
}
