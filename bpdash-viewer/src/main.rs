use anyhow::{bail, Context, Result};
use bpdash_core::{ChannelEvent, ObjectKey};
use bpdash_viewer::connect;
use bpdash_core::fairness::format_timestamp;
use bpdash_viewer::render::{render_bp, render_notification, render_object};
use bpdash_viewer::{
    submit_annotation, BpPanel, Notifier, ObjectMirror, ReadModelClient, SessionConfig, StateSyncChannel,
    ViewerSession,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bpdash-viewer")]
#[command(about = "Live monitoring state and business process timelines from a bpdash hub")]
struct Cli {
    #[arg(long, env = "BPDASH_HUB_URL", default_value = "http://localhost:8080")]
    hub_url: String,

    #[arg(long, env = "BPDASH_ENV", global = true)]
    env: Option<String>,

    /// Seconds before an unechoed command is reported
    #[arg(long, default_value = "10")]
    ack_timeout_secs: u64,

    #[arg(long, default_value = "8")]
    notification_ttl_secs: u64,

    /// Width of timeline bars in cells
    #[arg(long, default_value = "60")]
    width: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the environments the hub serves
    Environments,
    /// Print the current state of every object of the environment
    Environment,
    /// Follow live changes until the hub closes the channel
    Watch,
    /// Toggle one attribute of a service and wait for the hub to confirm
    Toggle {
        field: ToggleField,
        host: String,
        service: String,
    },
    /// Print availability and bars for business processes and their KPIs
    Timelines {
        /// Only this business process
        bp: Option<String>,
    },
    /// List outages of the last month nobody has annotated yet
    Events {
        bp: String,
    },
    /// Attach a note to a timeline event
    Annotate {
        bp: String,
        event: String,
        text: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ToggleField {
    State,
    Downtime,
    Acknowledgement,
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            ack_timeout: Duration::from_secs(self.ack_timeout_secs),
            notification_ttl: Duration::from_secs(self.notification_ttl_secs),
        }
    }

    fn env_name(&self) -> Result<&str> {
        match self.env.as_deref() {
            Some(env) => Ok(env),
            None => bail!("no environment given (--env or BPDASH_ENV)"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let client = ReadModelClient::new(cli.hub_url.clone());

    match &cli.command {
        Commands::Environments => {
            for name in client.environments().await? {
                println!("{name}");
            }
        }
        Commands::Environment => {
            let env = cli.env_name()?;
            let mirror = load_mirror(&client, env).await?;
            for (key, entry) in mirror.iter() {
                println!("{}", render_object(key, entry));
            }
        }
        Commands::Watch => {
            let (mut session, inbound) = open_session(&cli, &client).await?;
            println!("watching {} ({} objects)", session.channel.env(), session.mirror.len());
            let mut shown = 0u64;
            session
                .run(inbound, |s, delta| {
                    if let Some(entry) = s.mirror.get(&delta.key()) {
                        println!("{}", render_object(&delta.key(), entry));
                    }
                    for n in s.notifier.active(Instant::now()) {
                        if n.id > shown {
                            println!("{}", render_notification(n));
                            shown = n.id;
                        }
                    }
                })
                .await;
            for n in session.notifier.active(Instant::now()) {
                if n.id > shown {
                    println!("{}", render_notification(n));
                }
            }
        }
        Commands::Toggle { field, host, service } => {
            let (mut session, mut inbound) = open_session(&cli, &client).await?;
            let key = ObjectKey::new(host.clone(), service.clone());
            if session.mirror.get(&key).is_none() {
                bail!("{key} not found in {}", session.channel.env());
            }
            let sent = match field {
                ToggleField::State => session.toggle_state(&key),
                ToggleField::Downtime => session.toggle_downtime(&key),
                ToggleField::Acknowledgement => session.toggle_acknowledgement(&key),
            };
            let Some(id) = sent else {
                bail!("command was not sent: channel closed");
            };

            let deadline = tokio::time::Instant::now() + cli.session_config().ack_timeout;
            while session.channel.pending().any(|p| p.id == id) && session.channel.is_open() {
                match tokio::time::timeout_at(deadline, inbound.recv()).await {
                    Ok(Some(event)) => {
                        session.handle(event);
                    }
                    Ok(None) => break,
                    Err(_) => {
                        session.sweep(Instant::now() + cli.session_config().ack_timeout);
                        break;
                    }
                }
            }
            if let Some(entry) = session.mirror.get(&key) {
                println!("{}", render_object(&key, entry));
            }
            for n in session.notifier.active(Instant::now()) {
                println!("{}", render_notification(n));
            }
        }
        Commands::Timelines { bp } => {
            let mut notifier = Notifier::new(cli.session_config().notification_ttl);
            let listing = client.business_processes().await?;
            let selected: Vec<(String, String)> = match bp {
                Some(id) => match listing.get(id) {
                    Some(name) => vec![(id.clone(), name.clone())],
                    None => bail!("business process {id} not found"),
                },
                None => listing.into_iter().collect(),
            };
            for (id, name) in selected {
                match BpPanel::load(&client, &id, &name, &mut notifier).await {
                    Ok(panel) => println!("{}", render_bp(&panel, cli.width)),
                    Err(e) => {
                        notifier.fetch_failed(&e);
                    }
                }
            }
            for n in notifier.active(Instant::now()) {
                println!("{}", render_notification(n));
            }
        }
        Commands::Events { bp } => {
            let events = client.unannotated_events(bp).await?;
            if events.is_empty() {
                println!("no unannotated events for {bp}");
            }
            for e in events {
                println!(
                    "{}  {}  {:<12} {}",
                    e.id,
                    format_timestamp(e.frame.start),
                    e.kpi.as_deref().unwrap_or("-"),
                    format_timestamp(e.frame.end)
                );
            }
        }
        Commands::Annotate { bp, event, text } => {
            let mut notifier = Notifier::new(cli.session_config().notification_ttl);
            if let Some(frame) = submit_annotation(&client, bp, event, text, &mut notifier).await {
                println!(
                    "annotated {} event {}: {}",
                    bp,
                    frame.event_id(),
                    frame.annotation.unwrap_or_default()
                );
            }
            for n in notifier.active(Instant::now()) {
                println!("{}", render_notification(n));
            }
        }
    }
    Ok(())
}

async fn load_mirror(client: &ReadModelClient, env: &str) -> Result<ObjectMirror> {
    let view = client
        .environment(env)
        .await
        .with_context(|| format!("loading environment {env}"))?;
    Ok(ObjectMirror::from_environment(view))
}

async fn open_session(
    cli: &Cli,
    client: &ReadModelClient,
) -> Result<(ViewerSession, mpsc::UnboundedReceiver<ChannelEvent>)> {
    let env = cli.env_name()?;
    // subscribe first so no delta falls between the snapshot and the channel
    let transport = connect::connect(client.base_url()).await?;
    let mirror = load_mirror(client, env).await?;
    let channel = StateSyncChannel::new(env, transport.outbound);
    Ok((ViewerSession::new(channel, mirror, cli.session_config()), transport.inbound))
}
