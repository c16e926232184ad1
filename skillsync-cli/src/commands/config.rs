//! `skillsync config`: show the effective configuration.

use anyhow::{Context, Result};
use clap::Args;

use skillsync_core::config::{config_path_at, Config};

use super::{home_dir, load_config};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print as JSON instead of `KEY = value` lines.
    #[arg(long)]
    pub json: bool,
}

impl ConfigArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let config = load_config(&home)?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&config).context("failed to render config JSON")?
            );
            return Ok(());
        }

        println!("# file: {}", config_path_at(&home).display());
        for (key, value) in entries(&config) {
            println!("{key} = {value}");
        }
        Ok(())
    }
}

/// Effective values keyed by their environment variable names.
fn entries(config: &Config) -> Vec<(&'static str, String)> {
    let unset = || "<unset>".to_string();
    let redacted = |set: bool| if set { "***".to_string() } else { unset() };
    let auth = &config.auth;
    let transport = &config.transport;

    vec![
        ("LOG_LEVEL", config.log_level.clone()),
        ("LOG_FORMAT", format!("{:?}", config.log_format).to_lowercase()),
        ("KAFKA_URL", transport.url.clone()),
        (
            "KAFKA_CLIENT_CERT",
            transport.client_cert.clone().unwrap_or_else(unset),
        ),
        (
            "KAFKA_CLIENT_CERT_KEY",
            redacted(transport.client_cert_key.is_some()),
        ),
        ("KAFKA_GROUP_ID", transport.group_id.clone()),
        ("SKILL_SYNC_TOPIC", transport.topic.clone()),
        ("UBAHN_API_URL", config.ubahn_api_url.clone()),
        ("MEMBERS_API_URL", config.members_api_url.clone()),
        ("AUTH0_URL", auth.url.clone()),
        ("AUTH0_UBAHN_AUDIENCE", auth.ubahn_audience.clone()),
        ("AUTH0_TOPCODER_AUDIENCE", auth.topcoder_audience.clone()),
        ("AUTH0_CLIENT_ID", auth.client_id.clone().unwrap_or_else(unset)),
        ("AUTH0_CLIENT_SECRET", redacted(auth.client_secret.is_some())),
        (
            "AUTH0_PROXY_SERVER_URL",
            auth.proxy_server_url.clone().unwrap_or_else(unset),
        ),
        (
            "TOKEN_CACHE_TIME",
            auth.token_cache_time_secs
                .map(|s| s.to_string())
                .unwrap_or_else(unset),
        ),
        ("SKILL_PROVIDER_NAME", config.skill_provider_name.clone()),
        ("SLEEP_TIME", config.sleep_time_ms.to_string()),
        ("REQUEST_TIMEOUT_MS", config.request_timeout_ms.to_string()),
    ]
}
