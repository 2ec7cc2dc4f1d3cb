mod config;
mod pipeline;

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use icms_watcher_browser::{Credentials, PortalLayout, Step, WaitStrategy, WebDriverSession};
use icms_watcher_core::Extractor;
use icms_watcher_notify::{DryRunNotifier, Notifier, TelegramClient};
use icms_watcher_store::{FailurePolicy, FileStore};

use crate::config::{Cli, Command, RunArgs};
use crate::pipeline::{Outcome, Pipeline, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    info!("icms-watcher v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    match &cli.command {
        Command::Run(args) => run(&cli, args).await,
        Command::BotInfo => bot_info(&cli).await,
        Command::Chats => chats(&cli).await,
        Command::Send { to, text } => {
            telegram(&cli)?
                .send_message(to, text)
                .await
                .with_context(|| format!("sending message to {to}"))?;
            println!("sent");
            Ok(())
        }
    }
}

fn telegram(cli: &Cli) -> Result<TelegramClient> {
    Ok(TelegramClient::new(cli.token()?.to_string())?)
}

async fn run(cli: &Cli, args: &RunArgs) -> Result<()> {
    let store = FileStore::open(&args.state_dir)
        .await
        .with_context(|| format!("opening state directory {}", args.state_dir.display()))?;

    let notifier: Box<dyn Notifier> = if args.dry_run {
        Box::new(DryRunNotifier)
    } else {
        Box::new(telegram(cli)?)
    };

    let settings = Settings {
        credentials: Credentials {
            username: args.username.clone(),
            password: args.password.clone(),
        },
        owner: args.chat_id.clone(),
        subscribers: args.subscribers(),
        steps: Step::plan(args.role(), &args.program),
        layout: PortalLayout::with_base_url(&args.portal_url),
        wait: WaitStrategy::default(),
        extractor: Extractor::default(),
        policy: FailurePolicy {
            grace: args.grace,
            ..FailurePolicy::default()
        },
    };
    let pipeline = Pipeline::new(&store, notifier.as_ref(), &settings);

    let outcome = match WebDriverSession::connect(&args.webdriver_url, !args.headful).await {
        Ok(session) => pipeline.run(&session).await?,
        Err(e) => {
            warn!(error = %e, url = %args.webdriver_url, "could not start browser session");
            pipeline.fail(&e).await
        }
    };

    match outcome {
        Outcome::Updated { updates, delivery } => info!(
            account = %args.username,
            updates = updates.len(),
            sent = delivery.sent,
            failed = delivery.failed.len(),
            "run finished with updates"
        ),
        Outcome::Unchanged => info!(account = %args.username, "run finished, nothing new"),
        Outcome::Failed { verdict } => {
            warn!(account = %args.username, ?verdict, "run failed")
        }
    }
    Ok(())
}

async fn bot_info(cli: &Cli) -> Result<()> {
    let me = telegram(cli)?.get_me().await.context("calling getMe")?;
    println!(
        "{} (@{}) id={}",
        me.first_name,
        me.username.as_deref().unwrap_or("-"),
        me.id
    );
    Ok(())
}

async fn chats(cli: &Cli) -> Result<()> {
    let updates = telegram(cli)?
        .get_updates()
        .await
        .context("calling getUpdates")?;

    let chats: BTreeMap<i64, _> = updates
        .into_iter()
        .filter_map(|u| u.message)
        .map(|m| (m.chat.id, m.chat))
        .collect();
    if chats.is_empty() {
        println!("no chats yet; send the bot a message first");
    }
    for (id, chat) in chats {
        let name = chat
            .title
            .or(chat.username.map(|u| format!("@{u}")))
            .or(chat.first_name)
            .unwrap_or_default();
        println!("{id}\t{}\t{name}", chat.kind);
    }
    Ok(())
}
