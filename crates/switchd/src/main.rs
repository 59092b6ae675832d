// # switchd - Switch Synchronization Daemon
//
// Thin integration layer around switch-core. It:
// 1. Reads configuration from environment variables
// 2. Initializes logging and the runtime
// 3. Builds the switch device through the device registry
// 4. Activates the synchronization core and logs every notification
// 5. Deactivates the core on SIGTERM/SIGINT
//
// ## Configuration
//
// ### Device
// - `SWITCH_DEVICE_TYPE`: Device type (memory, file)
// - `SWITCH_DEVICE_NAME`: Device name (default: switchbox)
// - `SWITCH_DEVICE_PATH`: Path to the state file (for file devices)
// - `SWITCH_SWITCHES`: Switches and their states, e.g.
//   `laser:Off|On,shutter:Closed|Open`
//
// ### Watchdog
// - `SWITCH_WATCHDOG_INTERVAL`: Poll interval in seconds (default: 1.0)
// - `SWITCH_WATCHDOG_AUTOSTART`: Start polling on activation (default: false)
//
// ### Logging
// - `SWITCH_LOG_LEVEL`: trace, debug, info, warn or error (default: info)
//
// ## Example
//
// ```bash
// export SWITCH_DEVICE_TYPE=file
// export SWITCH_DEVICE_PATH=/var/lib/switchd/bench.json
// export SWITCH_SWITCHES=laser:Off|On,shutter:Closed|Open
// export SWITCH_WATCHDOG_AUTOSTART=true
//
// switchd
// ```

use anyhow::{Context, Result};
use std::env;
use std::process::ExitCode;
use switch_core::{
    AvailableStates, DeviceConfig, DeviceRegistry, SwitchConfig, SwitchEvent, SwitchLogic,
};
use tokio_stream::StreamExt;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum SwitchdExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<SwitchdExitCode> for ExitCode {
    fn from(code: SwitchdExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    device_type: String,
    device_name: String,
    device_path: Option<String>,
    switches: String,
    watchdog_interval: f64,
    watchdog_autostart: bool,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            device_type: env::var("SWITCH_DEVICE_TYPE").unwrap_or_else(|_| "memory".to_string()),
            device_name: env::var("SWITCH_DEVICE_NAME")
                .unwrap_or_else(|_| "switchbox".to_string()),
            device_path: env::var("SWITCH_DEVICE_PATH").ok(),
            switches: env::var("SWITCH_SWITCHES").context("SWITCH_SWITCHES is required")?,
            watchdog_interval: match env::var("SWITCH_WATCHDOG_INTERVAL") {
                Ok(raw) => raw.trim().parse().with_context(|| {
                    format!("SWITCH_WATCHDOG_INTERVAL is not a number: '{}'", raw)
                })?,
                Err(_) => 1.0,
            },
            watchdog_autostart: match env::var("SWITCH_WATCHDOG_AUTOSTART") {
                Ok(raw) => parse_flag(&raw)?,
                Err(_) => false,
            },
            log_level: env::var("SWITCH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        match self.device_type.as_str() {
            "memory" | "file" => {}
            _ => anyhow::bail!(
                "SWITCH_DEVICE_TYPE '{}' is not supported. \
                Supported types: memory, file",
                self.device_type
            ),
        }

        if self.device_name.is_empty() {
            anyhow::bail!("SWITCH_DEVICE_NAME cannot be empty");
        }

        if self.device_type == "file" {
            match self.device_path.as_deref() {
                None | Some("") => anyhow::bail!(
                    "SWITCH_DEVICE_PATH is required when SWITCH_DEVICE_TYPE=file. \
                    Set it via: export SWITCH_DEVICE_PATH=/var/lib/switchd/state.json"
                ),
                Some(path) => {
                    if let Some(parent) = std::path::Path::new(path).parent()
                        && !parent.as_os_str().is_empty()
                        && !parent.exists()
                    {
                        anyhow::bail!(
                            "SWITCH_DEVICE_PATH parent directory does not exist: {}. \
                            Create it first: sudo mkdir -p {}",
                            parent.display(),
                            parent.display()
                        );
                    }
                }
            }
        }

        if !self.watchdog_interval.is_finite() || self.watchdog_interval < 0.0 {
            anyhow::bail!(
                "SWITCH_WATCHDOG_INTERVAL must be a non-negative number of seconds. Got: {}",
                self.watchdog_interval
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "SWITCH_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Build the core configuration
    fn to_switch_config(&self) -> Result<SwitchConfig> {
        let switches = parse_switches(&self.switches)?;
        let device = match self.device_type.as_str() {
            "file" => DeviceConfig::File {
                name: self.device_name.clone(),
                path: self.device_path.clone().unwrap_or_default(),
                switches,
            },
            _ => DeviceConfig::Memory {
                name: self.device_name.clone(),
                switches,
            },
        };

        let mut config = SwitchConfig::new(device);
        config.watchdog.interval_secs = self.watchdog_interval;
        config.watchdog.autostart = self.watchdog_autostart;
        config.validate()?;
        Ok(config)
    }
}

/// Parse `name:State1|State2,name2:...` into a switch declaration
fn parse_switches(raw: &str) -> Result<AvailableStates> {
    let mut switches = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((name, states)) = entry.split_once(':') else {
            anyhow::bail!(
                "SWITCH_SWITCHES entry '{}' must look like name:State1|State2",
                entry
            );
        };
        let states: Vec<String> = states.split('|').map(|s| s.trim().to_string()).collect();
        switches.push((name.trim().to_string(), states));
    }

    if switches.is_empty() {
        anyhow::bail!(
            "SWITCH_SWITCHES must declare at least one switch. \
            Set it via: export SWITCH_SWITCHES=laser:Off|On"
        );
    }

    Ok(AvailableStates::new(switches)?)
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("SWITCH_WATCHDOG_AUTOSTART is not a boolean: '{}'", other),
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return SwitchdExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return SwitchdExitCode::ConfigError.into();
    }

    let switch_config = match config.to_switch_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration validation error: {}", e);
            return SwitchdExitCode::ConfigError.into();
        }
    };

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SwitchdExitCode::ConfigError.into();
    }

    info!("Starting switchd daemon");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SwitchdExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        if let Err(e) = run_daemon(switch_config).await {
            error!("Daemon error: {:#}", e);
            SwitchdExitCode::RuntimeError
        } else {
            SwitchdExitCode::CleanShutdown
        }
    })
    .into()
}

/// Run the daemon until a shutdown signal arrives
async fn run_daemon(config: SwitchConfig) -> Result<()> {
    let registry = DeviceRegistry::with_builtin_devices();
    let device = registry
        .create_device(&config.device)
        .context("Failed to create switch device")?;

    let (logic, _) = SwitchLogic::new(device, &config)?;
    let mut events = logic.events();

    logic.activate().await;
    info!(
        device = %logic.device_name(),
        switches = logic.number_of_switches(),
        watchdog = logic.watchdog_active(),
        "Switch core active"
    );
    info!(states = ?logic.get_all_states().await, "Initial switch states");

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    let signal = loop {
        tokio::select! {
            signal = &mut shutdown => break signal?,
            Some(event) = events.next() => match event {
                SwitchEvent::SwitchesChanged(states) => {
                    info!(states = ?states, "Switches changed");
                }
                SwitchEvent::WatchdogToggled(active) => {
                    info!(active, "Watchdog toggled");
                }
            },
        }
    };

    info!("Received shutdown signal: {}", signal);
    logic.deactivate().await;
    info!("Shutting down daemon");

    Ok(())
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
