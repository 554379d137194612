//! fprint HAL - Main entry point
//!
//! Drives a session against the software sensor so the state machine, the
//! lockout policy and the callback stream can be exercised from a shell.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fprint_core::HardwareAuthToken;
use fprint_hal::{
    CapabilityProvider, ClientEvent, EventSender, FingerprintHal, HalConfig, Operation, Session,
    SimulatedSensor,
};

#[derive(Parser)]
#[command(name = "fprint-hal")]
#[command(about = "Fingerprint session layer on a simulated sensor")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to $FPRINT_CONFIG, then the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// User whose templates are used
    #[arg(short, long, default_value_t = 0)]
    user: i32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a finger and list the user's templates
    Enroll {
        /// Touches needed to complete the enrollment
        #[arg(short, long, default_value_t = 3)]
        samples: u32,
    },

    /// Present unknown fingers, then optionally the enrolled one
    Authenticate {
        /// Rejected touches before the final attempt
        #[arg(short, long, default_value_t = 1)]
        failures: u32,

        /// Finish with a matching finger
        #[arg(long)]
        succeed: bool,
    },

    /// Reach a timed lockout and wait for it to clear
    Lockout,

    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fprint_hal=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    if let Commands::ShowConfig = cli.command {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    info!("Starting fprint HAL v{}", env!("CARGO_PKG_VERSION"));

    let sensor = Arc::new(SimulatedSensor::from_config(&config));
    let provider: Arc<dyn CapabilityProvider> = sensor.clone();
    let hal = FingerprintHal::new(provider, config)?;

    let (callback, rx) = EventSender::channel();
    let session = hal
        .create_session(hal.config().sensor_id, cli.user, Arc::new(callback))
        .context("Failed to open session")?;
    let _death = session.link_to_death();
    let printer = tokio::spawn(print_events(rx));

    let result = match cli.command {
        Commands::Enroll { samples } => enroll(&session, &sensor, samples).map(|_| ()),
        Commands::Authenticate { failures, succeed } => {
            authenticate(&session, &sensor, failures, succeed)
        }
        Commands::Lockout => lockout(&session, &sensor, hal.config()).await,
        Commands::ShowConfig => Ok(()),
    };

    session.close();
    printer.await?;
    result
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<HalConfig> {
    let path = path
        .or_else(|| std::env::var_os("FPRINT_CONFIG").map(PathBuf::from))
        .unwrap_or_else(HalConfig::default_path);

    if path.exists() {
        return HalConfig::load(&path)
            .with_context(|| format!("Failed to load config from {:?}", path));
    }

    let config = HalConfig::default();
    config.save(&path)?;
    info!("Created default config at {:?}", path);
    Ok(config)
}

fn enroll(
    session: &Session,
    sensor: &SimulatedSensor,
    samples: u32,
) -> anyhow::Result<Option<i32>> {
    session.generate_challenge()?;
    let hat = HardwareAuthToken::for_challenge(0, i64::from(session.user_id()));
    session.enroll(&hat)?;

    let template = sensor.touch_enroll(samples)?;
    match template {
        Some(id) => info!("Enrolled template {}", id),
        None => warn!("No room for another template"),
    }

    session.enumerate_enrollments()?;
    Ok(template)
}

fn authenticate(
    session: &Session,
    sensor: &SimulatedSensor,
    failures: u32,
    succeed: bool,
) -> anyhow::Result<()> {
    let template = enroll(session, sensor, 1)?;

    for attempt in 1..=failures {
        if !present_finger(session, i64::from(attempt))? {
            warn!("Attempt {} rejected while locked out", attempt);
            continue;
        }
        sensor.touch_reject()?;
    }

    if let (true, Some(id)) = (succeed, template) {
        if present_finger(session, 0)? {
            sensor.touch_match(id)?;
        }
    }
    Ok(())
}

/// Make sure an authentication is running; false while locked out
fn present_finger(session: &Session, operation_id: i64) -> anyhow::Result<bool> {
    if session.operation() == Operation::Idle {
        session.authenticate(operation_id)?;
    }
    Ok(session.operation() == Operation::Authenticating)
}

async fn lockout(
    session: &Session,
    sensor: &SimulatedSensor,
    config: &HalConfig,
) -> anyhow::Result<()> {
    let template = enroll(session, sensor, 1)?;

    for _ in 0..config.lockout.timed_threshold {
        if present_finger(session, 0)? {
            sensor.touch_reject()?;
        }
    }
    info!("Failed attempts: {}", session.failed_attempts());

    // Rejected without reaching the sensor
    session.authenticate(0)?;

    let wait = config.lockout.timed_duration() + Duration::from_millis(200);
    info!("Waiting {:?} for the lockout to clear", wait);
    tokio::time::sleep(wait).await;

    if let (true, Some(id)) = (present_finger(session, 0)?, template) {
        sensor.touch_match(id)?;
    }
    Ok(())
}

async fn print_events(mut rx: UnboundedReceiver<ClientEvent>) {
    while let Some(event) = rx.recv().await {
        println!("{:?}", event);
        if event == ClientEvent::SessionClosed {
            break;
        }
    }
}
