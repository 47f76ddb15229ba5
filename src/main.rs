use color_eyre::{eyre::eyre, Result};
use radiopad::config::{AppConfig, BoardKind};
use radiopad::controller::{
    Axis, ButtonId, ControllerError, ControllerHandle, DispatchHandle, Transition,
};
use radiopad::hardware::{Board, HardwareButton, RaspberryPiBoard, SimulatedBoard};
use radiopad::radio::{LoopbackRadio, MqttRadio, Radio, RadioBackend};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = setup_config().await?;
    info!("Starting radiopad with {:?} radio", config.radio.backend);

    let controllers = match config.radio.backend {
        RadioBackend::Mqtt => {
            let board = open_board(&config)?;
            let radio: Arc<dyn Radio> = Arc::new(
                MqttRadio::connect(config.radio.mqtt.clone())
                    .map_err(|e| eyre!("Failed to start MQTT radio: {}", e))?,
            );
            vec![ControllerHandle::new(
                board,
                radio,
                Some(config.controller.clone()),
            )]
        }
        RadioBackend::Loopback => loopback_demo(&config),
    };

    let mut handlers = Vec::new();
    for controller in &controllers {
        let role = controller
            .initialise()
            .map_err(|e| eyre!("Failed to initialise controller: {}", e))?;
        info!("Node running as {} controller", role);
        handlers.extend(
            log_transitions(controller)
                .map_err(|e| eyre!("Failed to register button handlers: {}", e))?,
        );
    }

    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received, shutting down");
    for controller in &controllers {
        controller.shutdown();
    }
    for handler in handlers {
        handler.join().await;
    }

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

async fn setup_config() -> Result<AppConfig> {
    let mut args = std::env::args().skip(1);
    let explicit = match (args.next().as_deref(), args.next()) {
        (Some("--config"), Some(path)) => Some(PathBuf::from(path)),
        (None, _) => None,
        _ => return Err(eyre!("Usage: radiopad [--config <path>]")),
    };

    let path = match explicit {
        Some(path) => path,
        None => {
            // Only the default location gets a generated file
            let path = AppConfig::default_path()?;
            AppConfig::ensure_default_config(&path).await?;
            path
        }
    };

    Ok(AppConfig::load(&path).await?)
}

fn open_board(config: &AppConfig) -> Result<Arc<dyn Board>> {
    match config.board.kind {
        BoardKind::Simulated => {
            warn!("Using simulated board, inputs stay idle");
            Ok(Arc::new(SimulatedBoard::new()))
        }
        BoardKind::RaspberryPi => Ok(Arc::new(RaspberryPiBoard::open(
            &config.board.raspberry_pi,
        )?)),
    }
}

/// Physical and virtual node in one process, linked by a loopback radio
///
/// The physical node's simulated stick sweeps back and forth and button A
/// toggles once per sweep step, so the virtual node has something to show.
fn loopback_demo(config: &AppConfig) -> Vec<ControllerHandle> {
    info!("Running loopback demo with a physical and a virtual node");
    let (physical_radio, virtual_radio) = LoopbackRadio::pair();
    let pins = config.controller.pins.clone();

    let physical_board = SimulatedBoard::new();
    physical_board.set_analog(pins.stick_x, 0);
    physical_board.set_analog(pins.stick_y, 0);

    let driver = physical_board.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(500));
        let mut step: u16 = 0;
        loop {
            ticker.tick().await;
            step = (step + 1) % 10;
            driver.set_analog(pins.stick_x, step * 113);
            driver.set_hardware_button(HardwareButton::A, step % 2 == 1);
        }
    });

    vec![
        ControllerHandle::new(
            Arc::new(physical_board),
            Arc::new(physical_radio),
            Some(config.controller.clone()),
        ),
        ControllerHandle::new(
            Arc::new(SimulatedBoard::new()),
            Arc::new(virtual_radio),
            Some(config.controller.clone()),
        ),
    ]
}

fn log_transitions(
    controller: &ControllerHandle,
) -> Result<Vec<DispatchHandle>, ControllerError> {
    let role = controller.role();
    let mut handles = Vec::new();

    for button in ButtonId::ALL {
        for transition in [Transition::Pressed, Transition::Released] {
            let observer = controller.clone();
            handles.push(controller.on_button(button, transition, move || {
                info!(
                    "[{:?}] Button {} {:?}, stick at ({}, {})",
                    role,
                    button,
                    transition,
                    observer.stick_position(Axis::X),
                    observer.stick_position(Axis::Y)
                );
            })?);
        }
    }
    Ok(handles)
}
