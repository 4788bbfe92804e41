use std::{
    collections::HashMap,
    io::ErrorKind,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::OnceLock,
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::Serialize;
use serde_json::Value;
use tokio::{
    net::TcpListener,
    sync::{mpsc, watch},
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use ivt490_common::{
    full_topic, topic_suffix, Adc, Bridge, BridgeState, ControlCommand, DigitalOutput,
    Potentiometer, RuntimeConfig, COMMAND_TOPICS, TOPIC_BRIDGE_STATE, TOPIC_CONTROLLER_STATE,
    TOPIC_HEATPUMP_RAW, TOPIC_HEATPUMP_STATE, TOPIC_SET_FEED_TARGET, TOPIC_SET_INDOOR_ACTUAL,
    TOPIC_SET_INDOOR_TARGET, TOPIC_SET_OPERATING_MODE, TOPIC_SET_OUTDOOR_OFFSET,
};

use crate::{sim, telemetry};

const MAX_MQTT_PAYLOAD_BYTES: usize = 512;
const COMMAND_QUEUE: usize = 32;
const TELEMETRY_QUEUE: usize = 8;

#[derive(Clone)]
struct HttpState {
    commands: mpsc::Sender<ControlCommand>,
    status: watch::Receiver<HostStatus>,
}

#[derive(Debug, Clone, Serialize)]
struct HostStatus {
    #[serde(flatten)]
    bridge: BridgeState,
    #[serde(rename = "lastFrameAt")]
    last_frame_at: Option<DateTime<Utc>>,
    #[serde(rename = "uptimeMs")]
    uptime_ms: u64,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct CommandAccepted {
    channel: &'static str,
    value: String,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut config = load_runtime_config(&config_path()).await?;
    apply_env_overrides(&mut config);

    let mut bridge = Bridge::new(&config, sim::peripherals(&config))
        .context("invalid bridge configuration")?;
    let base = config.mqtt.base_topic.clone();

    let mut mqtt_options = MqttOptions::new(
        config.mqtt.client_id.clone(),
        config.mqtt.host.clone(),
        config.mqtt.port,
    );
    mqtt_options.set_keep_alive(Duration::from_secs(30));
    if !config.mqtt.user.is_empty() {
        mqtt_options.set_credentials(config.mqtt.user.clone(), config.mqtt.pass.clone());
    }
    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);

    let (command_tx, mut command_rx) = mpsc::channel(COMMAND_QUEUE);
    let (line_tx, mut line_rx) = mpsc::channel(TELEMETRY_QUEUE);
    let mut last_frame_at: Option<DateTime<Utc>> = None;
    let (status_tx, status_rx) =
        watch::channel(host_status(&bridge, last_frame_at, monotonic_ms()));

    subscribe_topics(&mqtt, &base).await?;
    spawn_mqtt_loop(eventloop, base.clone(), command_tx.clone());
    telemetry::spawn_serial_reader(config.serial.clone(), line_tx);
    spawn_http_server(
        config.http_port,
        HttpState {
            commands: command_tx,
            status: status_rx,
        },
    )
    .await?;

    let mut sample = interval_ms(config.intervals.adc_sample_ms);
    let mut control = interval_ms(config.intervals.control_ms);
    let mut publish = interval_ms(config.intervals.state_publish_ms);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("ivt490 bridge running");
    loop {
        tokio::select! {
            _ = sample.tick() => bridge.on_sample_tick(),
            _ = control.tick() => {
                bridge.on_control_tick(monotonic_ms());
            }
            _ = publish.tick() => {
                // Publishing starts once the heat pump link is known to work.
                if bridge.frame().is_some() {
                    publish_state(&mqtt, &base, &bridge, monotonic_ms()).await;
                }
            }
            Some(line) = line_rx.recv() => {
                info!("telemetry line: {line}");
                let raw_topic = full_topic(&base, TOPIC_HEATPUMP_RAW);
                if let Err(err) = mqtt
                    .publish(raw_topic, QoS::AtMostOnce, false, line.clone())
                    .await
                {
                    warn!("raw telemetry publish failed: {err}");
                }
                match bridge.on_telemetry_line(&line) {
                    Ok(frame) => {
                        last_frame_at = Some(Utc::now());
                        debug!("decoded frame: {frame:?}");
                    }
                    Err(err) => warn!("discarding telemetry line: {err}"),
                }
            }
            Some(command) = command_rx.recv() => bridge.apply(command, monotonic_ms()),
            result = &mut shutdown => {
                if let Err(err) = result {
                    warn!("failed to listen for shutdown signal: {err}");
                }
                info!("shutting down");
                return Ok(());
            }
        }

        status_tx.send_replace(host_status(&bridge, last_frame_at, monotonic_ms()));
    }
}

fn config_path() -> PathBuf {
    std::env::var("IVT490_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./ivt490.json"))
}

async fn load_runtime_config(path: &Path) -> anyhow::Result<RuntimeConfig> {
    match tokio::fs::read(path).await {
        Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw)
            .with_context(|| format!("failed to parse {}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!("{} not found, using default configuration", path.display());
            Ok(RuntimeConfig::default())
        }
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

fn apply_env_overrides(config: &mut RuntimeConfig) {
    apply_overrides(config, |name| std::env::var(name).ok());
}

fn apply_overrides(config: &mut RuntimeConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("MQTT_HOST") {
        config.mqtt.host = host;
    }
    if let Some(port) = var("MQTT_PORT").and_then(|value| value.parse::<u16>().ok()) {
        config.mqtt.port = port;
    }
    if let Some(user) = var("MQTT_USER") {
        config.mqtt.user = user;
    }
    if let Some(pass) = var("MQTT_PASS") {
        config.mqtt.pass = pass;
    }
    if let Some(device) = var("IVT490_SERIAL") {
        config.serial.device = device;
    }
    if let Some(port) = var("IVT490_HTTP_PORT").and_then(|value| value.parse::<u16>().ok()) {
        config.http_port = port;
    }
}

fn interval_ms(period_ms: u64) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(Duration::from_millis(period_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

fn host_status<A, P, O>(
    bridge: &Bridge<A, P, O>,
    last_frame_at: Option<DateTime<Utc>>,
    now_ms: u64,
) -> HostStatus
where
    A: Adc,
    P: Potentiometer,
    O: DigitalOutput,
{
    HostStatus {
        bridge: bridge.state(now_ms),
        last_frame_at,
        uptime_ms: now_ms,
    }
}

async fn subscribe_topics(mqtt: &AsyncClient, base: &str) -> anyhow::Result<()> {
    for suffix in COMMAND_TOPICS {
        let topic = full_topic(base, suffix);
        mqtt.subscribe(topic.as_str(), QoS::AtMostOnce)
            .await
            .with_context(|| format!("failed to subscribe to {topic}"))?;
    }
    Ok(())
}

fn spawn_mqtt_loop(
    mut eventloop: rumqttc::EventLoop,
    base: String,
    commands: mpsc::Sender<ControlCommand>,
) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) =
                        handle_mqtt_message(&base, &commands, &message.topic, &message.payload)
                            .await
                    {
                        warn!("mqtt message handling error: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

async fn handle_mqtt_message(
    base: &str,
    commands: &mpsc::Sender<ControlCommand>,
    topic: &str,
    payload: &[u8],
) -> anyhow::Result<()> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return Ok(());
    }

    let message = std::str::from_utf8(payload).context("non utf8 mqtt payload")?;
    let channel = topic_suffix(base, topic)
        .with_context(|| format!("topic {topic} is outside base {base}"))?;
    let command = ControlCommand::parse(channel, message)
        .with_context(|| format!("rejected payload on {topic}"))?;

    commands
        .send(command)
        .await
        .context("bridge loop is not running")?;
    Ok(())
}

async fn publish_state<A, P, O>(
    mqtt: &AsyncClient,
    base: &str,
    bridge: &Bridge<A, P, O>,
    now_ms: u64,
) where
    A: Adc,
    P: Potentiometer,
    O: DigitalOutput,
{
    info!("publishing state");

    if let Some(frame) = bridge.frame() {
        publish_json(mqtt, &full_topic(base, TOPIC_HEATPUMP_STATE), frame).await;
    }
    publish_json(
        mqtt,
        &full_topic(base, TOPIC_CONTROLLER_STATE),
        &bridge.controller().state_payload(now_ms),
    )
    .await;
    publish_json(mqtt, &full_topic(base, TOPIC_BRIDGE_STATE), &bridge.state(now_ms)).await;
}

/// Publishes the whole document on `topic` and every leaf on its own subtopic.
async fn publish_json<T: Serialize>(mqtt: &AsyncClient, topic: &str, payload: &T) {
    let value = match serde_json::to_value(payload) {
        Ok(value) => value,
        Err(err) => {
            warn!("{topic} serialization failed: {err}");
            return;
        }
    };

    let mut messages = vec![(topic.to_string(), value.to_string())];
    flatten_json(topic, &value, &mut messages);

    for (topic, body) in messages {
        if let Err(err) = mqtt.publish(topic.as_str(), QoS::AtMostOnce, false, body).await {
            warn!("{topic} publish failed: {err}");
        }
    }
}

fn flatten_json(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    let Value::Object(map) = value else {
        return;
    };

    for (key, value) in map {
        let topic = format!("{prefix}/{key}");
        match value {
            Value::Object(_) => flatten_json(&topic, value, out),
            Value::String(text) => out.push((topic, text.clone())),
            other => out.push((topic, other.to_string())),
        }
    }
}

async fn spawn_http_server(port: u16, state: HttpState) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/feed-target", post(handle_feed_target))
        .route("/api/outdoor-offset", post(handle_outdoor_offset))
        .route("/api/indoor-target", post(handle_indoor_target))
        .route("/api/indoor-temperature", post(handle_indoor_temperature))
        .route("/api/mode", post(handle_mode))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind bridge server at {addr}"))?;
    info!("bridge listening on http://{addr}");

    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            warn!("http server stopped: {err}");
        }
    });
    Ok(())
}

async fn handle_get_status(State(state): State<HttpState>) -> impl IntoResponse {
    let status = state.status.borrow().clone();
    Json(status)
}

async fn handle_feed_target(
    State(state): State<HttpState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    submit_command(&state, TOPIC_SET_FEED_TARGET, &params).await
}

async fn handle_outdoor_offset(
    State(state): State<HttpState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    submit_command(&state, TOPIC_SET_OUTDOOR_OFFSET, &params).await
}

async fn handle_indoor_target(
    State(state): State<HttpState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    submit_command(&state, TOPIC_SET_INDOOR_TARGET, &params).await
}

async fn handle_indoor_temperature(
    State(state): State<HttpState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    submit_command(&state, TOPIC_SET_INDOOR_ACTUAL, &params).await
}

async fn handle_mode(
    State(state): State<HttpState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    submit_command(&state, TOPIC_SET_OPERATING_MODE, &params).await
}

async fn submit_command(
    state: &HttpState,
    channel: &'static str,
    params: &HashMap<String, String>,
) -> axum::response::Response {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let command = match ControlCommand::parse(channel, value) {
        Ok(command) => command,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };

    if state.commands.send(command).await.is_err() {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Bridge loop is not running",
        );
    }

    (
        StatusCode::ACCEPTED,
        Json(CommandAccepted {
            channel,
            value: value.trim().to_string(),
        }),
    )
        .into_response()
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
