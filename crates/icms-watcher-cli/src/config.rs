use std::convert::Infallible;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};

use icms_watcher_browser::navigator::{DEFAULT_PORTAL_URL, DEFAULT_PROGRAM, DEFAULT_ROLE_LABEL};
use icms_watcher_browser::webdriver::DEFAULT_WEBDRIVER_URL;
use icms_watcher_store::failure::DEFAULT_GRACE;

/// Watches the HsH campus portal for new grades.
#[derive(Debug, Parser)]
#[command(name = "icms-watcher")]
#[command(about = "Reports new and changed grades from the HsH campus portal via Telegram")]
#[command(version)]
pub struct Cli {
    /// Telegram bot token.
    #[arg(
        long,
        env = "ICMS_TG_API_TOKEN",
        global = true,
        hide_env_values = true,
        value_parser = unquoted
    )]
    pub telegram_token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check the grade table once and report what changed.
    Run(RunArgs),

    /// Show which bot the token belongs to.
    BotInfo,

    /// List chats that have messaged the bot, to find recipient ids.
    Chats,

    /// Send a one-off message.
    Send {
        /// Recipient chat id.
        #[arg(long)]
        to: String,

        text: String,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Portal username; also keys this account's stored state.
    #[arg(long, env = "ICMS_USERNAME", value_parser = unquoted)]
    pub username: String,

    #[arg(long, env = "ICMS_PASSWORD", hide_env_values = true, value_parser = unquoted)]
    pub password: String,

    /// Chat id receiving detailed updates and failure alerts.
    #[arg(long, env = "ICMS_TG_ID", value_parser = unquoted)]
    pub chat_id: String,

    /// Chat ids receiving name-only updates, comma separated.
    #[arg(
        long,
        env = "ICMS_TG_SUBSCRIBERS",
        value_delimiter = ',',
        value_parser = unquoted
    )]
    pub subscribers: Vec<String>,

    /// Consecutive failed runs before alerting.
    #[arg(
        long,
        env = "ICMS_GRACE",
        default_value_t = DEFAULT_GRACE,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub grace: u32,

    /// Select the student role after login (accounts with several roles).
    #[arg(
        long,
        env = "ICMS_PIN_ROLE",
        default_value_t = true,
        action = clap::ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub pin_role: bool,

    #[arg(long, env = "ICMS_ROLE_LABEL", default_value = DEFAULT_ROLE_LABEL)]
    pub role_label: String,

    /// Degree program whose grades are shown, as in the portal's icon title.
    #[arg(long, env = "ICMS_PROGRAM", default_value = DEFAULT_PROGRAM)]
    pub program: String,

    /// Show the browser window.
    #[arg(long, env = "ICMS_HEADFUL")]
    pub headful: bool,

    #[arg(long, env = "ICMS_WEBDRIVER_URL", default_value = DEFAULT_WEBDRIVER_URL)]
    pub webdriver_url: String,

    /// Directory holding baselines and failure counters.
    #[arg(long, env = "ICMS_STATE_DIR", default_value = "marks")]
    pub state_dir: PathBuf,

    /// Log messages instead of sending them.
    #[arg(long, env = "ICMS_DRY_RUN")]
    pub dry_run: bool,

    /// Portal `qisserver` root.
    #[arg(long, env = "ICMS_PORTAL_URL", default_value = DEFAULT_PORTAL_URL)]
    pub portal_url: String,
}

impl RunArgs {
    /// Subscribers with blank entries dropped.
    pub fn subscribers(&self) -> Vec<String> {
        self.subscribers
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn role(&self) -> Option<&str> {
        self.pin_role.then_some(self.role_label.as_str())
    }
}

impl Cli {
    pub fn token(&self) -> Result<&str> {
        self.telegram_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("missing ICMS_TG_API_TOKEN (required to talk to Telegram)"))
    }
}

/// Values copied out of `.env` files often keep their quotes.
fn unquoted(value: &str) -> Result<String, Infallible> {
    Ok(value.trim_matches(|c| c == '"' || c == '\'').to_string())
}
