use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::info;

use crosscap::config::Config;
use crosscap::logging::init_logging;
use crosscap::router::{InMemoryHistory, Navigator, RouterEvent};
use crosscap::steps::{compile, FlowMode};
use crosscap::sync::{CompanionSession, InMemoryRelay, InitiatorSession, PairingLink};

#[derive(Parser)]
#[command(
    name = "crosscap",
    about = "Cross-device capture session core",
    version
)]
struct Cli {
    /// Path to a config file (in addition to crosscap.toml discovery)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Force debug-level logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the compiled screen plan for the configured step list
    Compile {
        /// Compile the companion-side (mobile) plan
        #[arg(long)]
        mobile: bool,

        /// Compile the desktop cross-device flow instead of the capture flow
        #[arg(long)]
        cross_device: bool,
    },
    /// Run a full initiator/companion pairing session in-process over the
    /// in-memory relay
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let _logging = init_logging(&config, cli.debug)?;

    match cli.command {
        Command::Compile {
            mobile,
            cross_device,
        } => run_compile(&config, mobile, cross_device),
        Command::Demo => run_demo(config).await,
    }
}

fn run_compile(config: &Config, mobile: bool, cross_device: bool) -> Result<()> {
    let flow = if cross_device {
        FlowMode::CrossDevice
    } else {
        FlowMode::CaptureSteps
    };
    let plan = compile(flow, &config.document_type, &config.steps, mobile);

    println!(
        "{flow} plan for document type '{}' ({} screens):",
        config.document_type,
        plan.len()
    );
    for (index, entry) in plan.iter().enumerate() {
        println!(
            "  {index:>2}  {:<16} [{}]",
            entry.screen.to_string(),
            entry.step.kind
        );
    }
    Ok(())
}

/// Drive both roles of a session against each other: the desktop detours
/// into the cross-device flow, the companion joins through the pairing
/// link, runs the delegated steps, and reports success back.
async fn run_demo(config: Config) -> Result<()> {
    info!(
        sync_url = config.relay.sync_url,
        "demo pairs both roles over the in-memory relay; a network relay would be dialed here"
    );
    let relay = InMemoryRelay::new();

    let (session_tx, mut session_events) = mpsc::unbounded_channel();
    let mut initiator = InitiatorSession::start(
        &relay,
        None,
        "demo-token",
        config.steps.clone(),
        config.document_type.clone(),
        session_tx,
    )
    .await?;

    let (router_tx, mut desktop_events) = mpsc::unbounded_channel();
    let mut desktop = Navigator::new(
        config.steps.clone(),
        config.document_type.clone(),
        false,
        0,
        Box::new(InMemoryHistory::new()),
        router_tx,
    );
    desktop.set_flow_observer(initiator.flow_observer());

    // The user reaches the first capture screen and opts for the hand-off.
    desktop.advance();
    desktop.switch_flow(FlowMode::CrossDevice, 0);

    while initiator.room_id().is_none() {
        let Some(message) = initiator.recv().await else {
            bail!("relay closed before a room was assigned");
        };
        initiator.handle_message(message, &mut desktop)?;
    }
    let link = initiator
        .pairing_link()
        .context("room assigned but no pairing link available")?;
    info!(
        url = link.url(&config.link.mobile_base, &config.link.origin),
        "pairing link ready"
    );

    let companion_relay = relay.clone();
    let companion_link = link.clone();
    let companion =
        tokio::spawn(async move { run_companion(companion_relay, companion_link).await });

    while !initiator.is_client_success() {
        let Some(message) = initiator.recv().await else {
            bail!("relay closed mid-session");
        };
        initiator.handle_message(message, &mut desktop)?;

        while let Ok(event) = session_events.try_recv() {
            info!(?event, "initiator event");
        }
        while let Ok(event) = desktop_events.try_recv() {
            log_router_event("desktop", &event);
        }
    }

    companion.await.context("companion task panicked")??;
    info!("cross-device session complete");
    Ok(())
}

async fn run_companion(relay: InMemoryRelay, link: PairingLink) -> Result<()> {
    let mut session = CompanionSession::start(&relay, &link).await?;
    let mobile_config = session.await_config().await?;
    info!(
        steps = mobile_config.steps.len(),
        resume_step = mobile_config.step,
        "companion configured"
    );

    let (router_tx, mut router_events) = mpsc::unbounded_channel();
    let mut navigator = session
        .build_navigator(router_tx)
        .context("companion config missing after adoption")?;

    // Walk the delegated flow through to its terminal screen.
    let plan_len = navigator.plan().len();
    for _ in navigator.index()..plan_len {
        navigator.advance();
    }

    while let Ok(event) = router_events.try_recv() {
        session.handle_router_event(&event)?;
        log_router_event("companion", &event);
    }
    Ok(())
}

fn log_router_event(role: &str, event: &RouterEvent) {
    match event {
        RouterEvent::StepChanged { position, entry } => {
            let screen = entry
                .as_ref()
                .map(|e| e.screen.to_string())
                .unwrap_or_else(|| "-".to_string());
            info!(role, flow = %position.flow, index = position.index, screen, "screen changed");
        }
        RouterEvent::Completed => info!(role, "flow complete"),
        RouterEvent::ClientSuccess => info!(role, "client success"),
    }
}
