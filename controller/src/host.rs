use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, error, info, warn};

use breezer_common::{BreezerEngine, DeviceState, EngineAction, LtUartProtocol, RuntimeConfig};

use crate::console;

const READ_BUFFER_CAPACITY: usize = 256;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = config_path();
    let mut runtime = load_runtime_config(&config_path)
        .await
        .unwrap_or_else(|err| {
            warn!("failed to load runtime config: {err:#}");
            RuntimeConfig::default()
        });
    apply_env_overrides(&mut runtime);
    runtime.sanitize();

    let mut engine = BreezerEngine::new(runtime.traits.clone());
    for (name, preset) in &runtime.presets {
        engine.add_preset(name, preset.clone());
    }
    engine.subscribe(log_state);

    let serial = &runtime.serial;
    let port = tokio_serial::new(&serial.port, serial.baud_rate)
        .open_native_async()
        .with_context(|| format!("failed to open serial port {}", serial.port))?;
    info!("breezer link on {} at {} baud", serial.port, serial.baud_rate);

    let (mut rx, mut tx) = tokio::io::split(port);
    let mut protocol = LtUartProtocol::new();
    let mut rx_buf = BytesMut::with_capacity(READ_BUFFER_CAPACITY);

    let mut console_lines = BufReader::new(tokio::io::stdin()).lines();
    let mut console_open = true;

    let mut poll = tokio::time::interval(Duration::from_millis(runtime.poll_interval_ms));

    loop {
        let actions = tokio::select! {
            _ = poll.tick() => engine.request_state(),
            read = rx.read_buf(&mut rx_buf) => {
                let count = read.context("serial read failed")?;
                if count == 0 {
                    bail!("serial port closed");
                }
                protocol
                    .read_uart_data(&mut rx_buf, &mut ())
                    .into_iter()
                    .flat_map(|frame| engine.handle_frame(frame))
                    .collect()
            }
            line = console_lines.next_line(), if console_open => match line {
                Ok(Some(line)) => console::handle_line(&mut engine, &line),
                Ok(None) => {
                    debug!("console closed");
                    console_open = false;
                    Vec::new()
                }
                Err(err) => {
                    warn!("console read failed: {err}");
                    console_open = false;
                    Vec::new()
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        };

        if let Err(err) = execute_engine_actions(&mut protocol, &mut tx, actions).await {
            error!("{err:#}");
            return Err(err);
        }
    }

    Ok(())
}

async fn execute_engine_actions<W>(
    protocol: &mut LtUartProtocol,
    port: &mut W,
    actions: Vec<EngineAction>,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if actions.is_empty() {
        return Ok(());
    }

    let mut out = BytesMut::new();
    for action in actions {
        debug!("engine action: {action:?}");
        let Some(frame) = action.clone().into_frame() else {
            warn!("{action:?} is not available on this link");
            continue;
        };
        if let Err(err) = protocol.write_frame(&frame, &mut out) {
            debug!("{:?} not written: {err}", frame.kind());
        }
    }

    port.write_all(&out).await.context("serial write failed")?;
    port.flush().await.context("serial flush failed")?;
    Ok(())
}

fn log_state(state: &DeviceState, request_id: u32) {
    match serde_json::to_string(state) {
        Ok(json) => info!("state[{request_id}]: {json}"),
        Err(err) => warn!("state serialization failed: {err}"),
    }
}

fn config_path() -> PathBuf {
    std::env::var("BREEZER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("breezer.json"))
}

async fn load_runtime_config(path: &Path) -> anyhow::Result<RuntimeConfig> {
    match tokio::fs::read(path).await {
        Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw)
            .with_context(|| format!("invalid runtime config {}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

fn apply_env_overrides(runtime: &mut RuntimeConfig) {
    if let Ok(port) = std::env::var("BREEZER_PORT") {
        runtime.serial.port = port;
    }
    if let Some(baud_rate) = std::env::var("BREEZER_BAUD")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
    {
        runtime.serial.baud_rate = baud_rate;
    }
}
