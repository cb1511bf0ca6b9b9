//! Config command implementation.

use crate::cli::ConfigAction;
use crate::config::Settings;
use anyhow::Result;

/// Run the config command.
pub fn run_config(action: &ConfigAction, settings: Settings) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&redacted(settings))
                .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
            println!("{}", toml_str);
        }

        ConfigAction::Path => {
            let config_path = Settings::default_config_path();
            println!("{}", config_path.display());
        }
    }

    Ok(())
}

fn redacted(mut settings: Settings) -> Settings {
    if settings.server.secret.is_some() {
        settings.server.secret = Some("<redacted>".to_string());
    }
    settings
}
