use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use mailjet_sync::config;
use mailjet_sync::connection::ConnectionPool;
use mailjet_sync::mailer::{DefaultSender, MailRouter, OutgoingMessage};
use mailjet_sync::smtp::SmtpTransport;
use mailjet_sync::sync;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run every reconciliation step (events, properties, segments, templates)
    Setup {
        /// Restrict to one store
        #[arg(long)]
        store: Option<u32>,
    },
    /// Reconcile webhook subscriptions
    SetupEvents {
        #[arg(long)]
        store: Option<u32>,
    },
    /// Create missing contact properties (ecommerce stores)
    SetupProperties {
        #[arg(long)]
        store: Option<u32>,
    },
    /// Create missing segments (ecommerce stores)
    SetupSegments {
        #[arg(long)]
        store: Option<u32>,
    },
    /// Provision default templates and record their remote ids
    SetupTemplates {
        #[arg(long)]
        store: Option<u32>,
    },
    /// Push local template assets to the remote account for one store
    ImportTemplates {
        #[arg(long)]
        store: u32,
    },
    /// Pull remote template edits back into the local default assets
    ExportTemplates {
        #[arg(long)]
        store: u32,
    },
    /// Route one hand-built message through the mail router
    SendTest {
        #[arg(long)]
        store: u32,
        #[arg(long)]
        to: String,
        #[arg(long)]
        from: String,
    },
    /// Print an example configuration file
    PrintExample,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();

    if matches!(args.command, Command::PrintExample) {
        print!("{}", config::example());
        return Ok(());
    }

    let mut cfg = config::load(Some(&args.config))?;
    let mut pool = ConnectionPool::new();

    match args.command {
        Command::Setup { store } => {
            // persist even on failure: ids recorded for templates provisioned
            // before the error must reach the file, or the next run recreates
            // those templates remotely
            let result = sync::setup_all(&mut cfg, &mut pool, store).await;
            cfg.persist(&args.config)?;
            result?;
        }
        Command::SetupEvents { store } => {
            sync::setup_events(&cfg, &mut pool, store).await?;
        }
        Command::SetupProperties { store } => {
            sync::setup_properties(&cfg, &mut pool, store).await?;
        }
        Command::SetupSegments { store } => {
            sync::setup_segments(&cfg, &mut pool, store).await?;
        }
        Command::SetupTemplates { store } => {
            let result = sync::setup_templates(&mut cfg, &mut pool, store).await;
            cfg.persist(&args.config)?;
            result?;
        }
        Command::ImportTemplates { store } => {
            sync::import_templates(&cfg, &mut pool, store).await?;
        }
        Command::ExportTemplates { store } => {
            sync::export_templates(&cfg, &mut pool, store).await?;
        }
        Command::SendTest { store, to, from } => {
            let router = MailRouter::new(Arc::new(DefaultSender), SmtpTransport::new());
            let message = OutgoingMessage {
                from,
                to: vec![to],
                reply_to: None,
                sender: None,
                subject: "mailjet-sync test message".into(),
                body: "This message verifies the SMTP relay configuration.".into(),
            };
            router.send(&cfg, store, &message).await?;
            info!(store, "test message sent");
        }
        Command::PrintExample => unreachable!("handled above"),
    }

    Ok(())
}
