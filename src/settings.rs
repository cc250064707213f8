use std::time::Duration;

use config::{Config, Environment, File};

use serde::Deserialize;

use url::Url;

use crate::errors::SettingsError;

pub const SETTINGS_PATH_VAR: &str = "APP_SETTINGS";
pub const DEFAULT_SETTINGS_PATH: &str = "appsettings.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub prefix: String,
    pub discord: DiscordSettings,
    pub doujin: DoujinSettings,
    pub http: HttpSettings,
    pub server: ServerSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            prefix: "n!".into(),
            discord: DiscordSettings::default(),
            doujin: DoujinSettings::default(),
            http: HttpSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DiscordSettings {
    pub token: String,
    pub server: GuildSettings,
    pub status: StatusSettings,
    pub command: CommandSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GuildSettings {
    pub server_id: u64,
    pub log_channel_id: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusSettings {
    pub update_interval: f64,
    pub games: Vec<String>,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            update_interval: 1.0,
            games: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommandSettings {
    pub interactive_expiry: f64,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            interactive_expiry: 5.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DoujinSettings {
    pub update_interval: f64,
    pub download_proxies: Vec<String>,
    pub max_concurrent_proxies: Option<u32>,
    // minutes
    pub proxy_check_interval: f64,
    // seconds
    pub proxy_request_timeout: f64,
    pub proxy_check_attempts: u32,
}

impl Default for DoujinSettings {
    fn default() -> Self {
        Self {
            update_interval: 1.0,
            download_proxies: Vec::new(),
            max_concurrent_proxies: None,
            proxy_check_interval: 5.0,
            proxy_request_timeout: 10.0,
            proxy_check_attempts: 3,
        }
    }
}

impl DoujinSettings {
    pub fn proxy_check_interval(&self) -> Duration {
        seconds(self.proxy_check_interval * 60.0).unwrap_or(Duration::MAX)
    }

    pub fn proxy_request_timeout(&self) -> Duration {
        seconds(self.proxy_request_timeout).unwrap_or(Duration::MAX)
    }

    pub fn target_proxy_count(&self) -> usize {
        let total = self.download_proxies.len();

        match self.max_concurrent_proxies {
            Some(max) => total.min(max as usize),
            None => total,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub concurrency: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub access_token: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".into(),
            access_token: None,
        }
    }
}

impl AppSettings {
    pub fn load() -> Result<Self, SettingsError> {
        let path =
            std::env::var(SETTINGS_PATH_VAR).unwrap_or_else(|_| DEFAULT_SETTINGS_PATH.into());

        Self::load_from(&path, environment())
    }

    pub fn load_from(path: &str, env: Environment) -> Result<Self, SettingsError> {
        let settings: AppSettings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(env)
            .build()?
            .try_deserialize()?;

        settings.validate()?;

        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        // intervals are minutes, the request timeout is seconds
        positive(
            "discord.status.update_interval",
            self.discord.status.update_interval * 60.0,
        )?;
        positive(
            "discord.command.interactive_expiry",
            self.discord.command.interactive_expiry * 60.0,
        )?;
        positive("doujin.update_interval", self.doujin.update_interval * 60.0)?;
        positive(
            "doujin.proxy_check_interval",
            self.doujin.proxy_check_interval * 60.0,
        )?;
        positive("doujin.proxy_request_timeout", self.doujin.proxy_request_timeout)?;

        if self.doujin.proxy_check_attempts == 0 {
            return Err(SettingsError::invalid(
                "doujin.proxy_check_attempts",
                "must be at least 1",
            ));
        }

        if self.http.concurrency == 0 {
            return Err(SettingsError::invalid("http.concurrency", "must be at least 1"));
        }

        for proxy in &self.doujin.download_proxies {
            let url = Url::parse(proxy).map_err(|e| {
                SettingsError::invalid("doujin.download_proxies", format!("'{}': {}", proxy, e))
            })?;

            if !matches!(url.scheme(), "http" | "https") {
                return Err(SettingsError::invalid(
                    "doujin.download_proxies",
                    format!("'{}': unsupported scheme {}", proxy, url.scheme()),
                ));
            }
        }

        Ok(())
    }
}

pub fn environment() -> Environment {
    Environment::with_prefix("APP")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("doujin.download_proxies")
        .with_list_parse_key("discord.status.games")
}

fn seconds(value: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(value).ok()
}

fn positive(key: &'static str, secs: f64) -> Result<(), SettingsError> {
    match seconds(secs) {
        Some(duration) if !duration.is_zero() => Ok(()),
        _ => Err(SettingsError::invalid(
            key,
            "must be a positive, finite duration",
        )),
    }
}
