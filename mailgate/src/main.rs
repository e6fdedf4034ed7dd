use mailgate_common::{config::Config, logging};

mod controller;
mod sched;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = find_config_file()?;
    let config = Config::load(&config_path)?;

    logging::init(&config.logger.level);

    controller::run(config).await
}

/// Find the configuration file using the following precedence:
/// 1. `MAILGATE_CONFIG` environment variable
/// 2. ./mailgate.toml (current working directory)
/// 3. /etc/mailgate/mailgate.toml (system-wide config)
fn find_config_file() -> anyhow::Result<std::path::PathBuf> {
    if let Ok(env_path) = std::env::var("MAILGATE_CONFIG") {
        let path = std::path::PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!(
            "MAILGATE_CONFIG points to non-existent file: {}",
            path.display()
        );
    }

    let default_paths = vec![
        std::path::PathBuf::from("./mailgate.toml"),
        std::path::PathBuf::from("/etc/mailgate/mailgate.toml"),
    ];

    for path in &default_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let paths_tried = default_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - MAILGATE_CONFIG environment variable\n{paths_tried}"
    )
}
