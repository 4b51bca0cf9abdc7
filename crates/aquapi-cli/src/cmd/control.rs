use crate::output::print_json;
use aquapi_controller::{
    ExecutionLoop, HttpClient, LoopStats, OutputLine, ReportPolicy, Shutdown, SimulatedLine,
};
use aquapi_core::config::{Config, ControllerConfig, WarnLevel};
use anyhow::{anyhow, Context};
use clap::Args;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct ControlArgs {
    /// Actuator to control (overrides controller.actuator_id)
    #[arg(long, env = "AQUAPI_ACTUATOR_ID")]
    actuator: Option<i64>,

    /// Decision server base URL (overrides controller.server_url)
    #[arg(long, env = "AQUAPI_SERVER_URL")]
    server_url: Option<String>,

    /// GPIO line offset driving the pump (overrides controller.gpio_pin)
    #[arg(long)]
    pin: Option<u32>,

    /// GPIO character device (overrides controller.gpio_chip)
    #[arg(long)]
    chip: Option<PathBuf>,

    /// Log output changes instead of touching GPIO
    #[arg(long)]
    dry_run: bool,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(config_path: &Path, args: ControlArgs, json: bool) -> anyhow::Result<()> {
    let mut config = Config::load_or_default(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let settings = &mut config.controller;
    if let Some(url) = args.server_url {
        settings.server_url = url;
    }
    if let Some(pin) = args.pin {
        settings.gpio_pin = pin;
    }
    if let Some(chip) = args.chip {
        settings.gpio_chip = Some(chip);
    }
    if args.actuator.is_some() {
        settings.actuator_id = args.actuator;
    }
    check_config(&config)?;

    let settings = config.controller;
    let actuator_id = settings
        .actuator_id
        .ok_or_else(|| anyhow!("no actuator selected; pass --actuator or set controller.actuator_id"))?;

    let client = HttpClient::new(settings.server_url.clone(), settings.request_timeout())
        .context("failed to build HTTP client")?;

    // Handlers go in before the line is opened so no activation can start
    // while a signal would still kill the process outright.
    let shutdown = Shutdown::new();
    install_signal_handlers(shutdown.clone()).context("failed to install signal handlers")?;

    tracing::info!(
        actuator_id,
        server = %settings.server_url,
        pin = settings.gpio_pin,
        dry_run = args.dry_run,
        "starting controller"
    );

    let stats = if args.dry_run {
        let line = SimulatedLine::new();
        drive(actuator_id, client, line, shutdown, &settings, args.once)?
    } else {
        let line = open_gpio(&settings)?;
        drive(actuator_id, client, line, shutdown, &settings, args.once)?
    };

    if json {
        print_json(&stats)?;
    } else {
        println!(
            "cycles={} activations={} poll_failures={} lost_reports={}",
            stats.cycles, stats.activations, stats.poll_failures, stats.lost_reports
        );
    }
    Ok(())
}

/// Log every warning and refuse to start on errors.
fn check_config(config: &Config) -> anyhow::Result<()> {
    let mut errors = Vec::new();
    for w in config.validate() {
        match w.level {
            WarnLevel::Warning => tracing::warn!("{}", w.message),
            WarnLevel::Error => errors.push(w.message),
        }
    }
    if !errors.is_empty() {
        anyhow::bail!("config validation found errors: {}", errors.join("; "));
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn open_gpio(settings: &ControllerConfig) -> anyhow::Result<aquapi_controller::CdevLine> {
    use aquapi_controller::{detect_chip, CdevLine, DEVICE_TREE_MODEL};

    let chip = settings
        .gpio_chip
        .clone()
        .unwrap_or_else(|| detect_chip(Path::new(DEVICE_TREE_MODEL)));
    CdevLine::open(&chip, settings.gpio_pin, settings.active_low).with_context(|| {
        format!(
            "failed to open GPIO line {} on {}",
            settings.gpio_pin,
            chip.display()
        )
    })
}

#[cfg(not(target_os = "linux"))]
fn open_gpio(_settings: &ControllerConfig) -> anyhow::Result<SimulatedLine> {
    anyhow::bail!("GPIO output needs a Linux GPIO character device; use --dry-run")
}

fn drive<L: OutputLine>(
    actuator_id: i64,
    client: HttpClient,
    line: L,
    shutdown: Shutdown,
    settings: &ControllerConfig,
    once: bool,
) -> anyhow::Result<LoopStats> {
    let mut exec = ExecutionLoop::new(actuator_id, client, line, shutdown)?
        .with_report_policy(ReportPolicy {
            attempts: settings.report_attempts,
            retry_delay: settings.report_retry_delay(),
        });

    if once {
        let outcome = exec.run_cycle()?;
        tracing::info!(?outcome, "single cycle finished");
        return Ok(exec.stats().clone());
    }

    Ok(exec.run()?)
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

/// Register SIGINT, SIGTERM and SIGHUP now, then trigger `shutdown` from a
/// helper thread when one arrives. The blocking loop never runs inside the
/// async runtime.
fn install_signal_handlers(shutdown: Shutdown) -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let signals = {
        let _guard = rt.enter();
        Signals::register()?
    };
    std::thread::Builder::new()
        .name("aquapi-signals".into())
        .spawn(move || {
            rt.block_on(signals.recv());
            tracing::info!("shutdown requested");
            shutdown.trigger();
        })?;
    Ok(())
}

#[cfg(unix)]
struct Signals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    async fn recv(mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => {}
            _ = self.terminate.recv() => {}
            _ = self.hangup.recv() => {}
        }
    }
}

#[cfg(windows)]
struct Signals(tokio::signal::windows::CtrlC);

#[cfg(windows)]
impl Signals {
    fn register() -> std::io::Result<Self> {
        Ok(Self(tokio::signal::windows::ctrl_c()?))
    }

    async fn recv(mut self) {
        self.0.recv().await;
    }
}
