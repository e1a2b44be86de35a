use std::{io::ErrorKind, net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::Mutex, task::JoinError};
use tracing::{info, warn};

use aguaiot_common::{
    setup_entry, setup_platform,
    topics::{
        availability_topic, command_filter, parse_command_topic, state_topic, CMD_FAN, CMD_MODE,
        CMD_POWER, CMD_TEMPERATURE,
    },
    AguaClimate, BridgeConfig, ClimateState, HvacMode, IntegrationData,
};

use crate::simulated::{SimulatedAccount, SimulatedStove};

const MAX_MQTT_PAYLOAD_BYTES: usize = 512;

struct BridgeEntity {
    climate: AguaClimate<SimulatedStove>,
    available: bool,
    last_update: Option<DateTime<Utc>>,
}

impl BridgeEntity {
    fn new(climate: AguaClimate<SimulatedStove>) -> Self {
        Self {
            climate,
            available: false,
            last_update: None,
        }
    }

    fn poll(&mut self) -> bool {
        let ok = self.climate.update();
        if ok {
            self.last_update = Some(Utc::now());
        }
        let changed = ok != self.available;
        self.available = ok;
        changed
    }

    fn view(&self) -> EntityView {
        EntityView {
            state: self.climate.state(),
            available: self.available,
            last_update: self.last_update,
        }
    }
}

#[derive(Debug, Serialize)]
struct EntityView {
    #[serde(flatten)]
    state: ClimateState,
    available: bool,
    #[serde(rename = "lastUpdate")]
    last_update: Option<DateTime<Utc>>,
}

#[derive(Clone)]
struct AppState {
    entities: Arc<Mutex<Vec<BridgeEntity>>>,
    mqtt: AsyncClient,
}

#[derive(Clone)]
struct ConfigStore {
    path: Arc<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct TemperatureRequest {
    #[serde(default)]
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FanModeRequest {
    #[serde(default)]
    fan_mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HvacModeRequest {
    hvac_mode: String,
}

#[derive(Debug, Serialize)]
struct UpdateResponse {
    success: bool,
    #[serde(flatten)]
    entity: EntityView,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = ConfigStore::new();
    let mut config = store.load().await.unwrap_or_else(|err| {
        warn!("failed to load bridge config from store: {err:#}");
        BridgeConfig::default()
    });
    apply_env_overrides(&mut config);
    config.sanitize();

    let mut data = IntegrationData::default();
    data.insert(
        config.entry.unique_id.clone(),
        SimulatedAccount::new(config.simulated_devices),
    );

    let entities = register_entities(&data, &config)?;
    let startup_availability = availability_snapshot(&entities);

    let mut mqtt_options =
        MqttOptions::new("aguaiot-bridge-rust", config.mqtt.host.clone(), config.mqtt.port);
    if !config.mqtt.user.is_empty() {
        mqtt_options.set_credentials(config.mqtt.user.clone(), config.mqtt.pass.clone());
    }
    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);

    let app_state = AppState {
        entities: Arc::new(Mutex::new(entities)),
        mqtt,
    };

    app_state
        .mqtt
        .subscribe(command_filter(), QoS::AtMostOnce)
        .await
        .context("failed to subscribe to command topics")?;
    spawn_mqtt_loop(app_state.clone(), eventloop);
    for (id, available) in startup_availability {
        publish_availability(&app_state.mqtt, &id, available).await;
    }
    spawn_poll_loop(
        app_state.clone(),
        Duration::from_millis(config.poll_interval_ms),
    );
    spawn_state_publish_loop(
        app_state.clone(),
        Duration::from_millis(config.state_publish_interval_ms),
    );

    let app = router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind bridge server at {addr}"))?;

    info!("bridge listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn register_entities(
    data: &IntegrationData<SimulatedAccount>,
    config: &BridgeConfig,
) -> anyhow::Result<Vec<BridgeEntity>> {
    setup_platform(&config.entry, |_: Vec<AguaClimate<SimulatedStove>>, _| {});

    let mut entities = Vec::new();
    setup_entry(data, &config.entry, |climates, update_before_add| {
        for climate in climates {
            let mut entity = BridgeEntity::new(climate);
            if update_before_add {
                entity.poll();
            }
            entities.push(entity);
        }
    })
    .context("failed to set up climate entities")?;
    Ok(entities)
}

// Poll-loop publishes only on change, so startup has to announce every device once.
fn availability_snapshot(entities: &[BridgeEntity]) -> Vec<(String, bool)> {
    entities
        .iter()
        .map(|entity| (entity.climate.unique_id(), entity.available))
        .collect()
}

fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/climate", get(handle_list))
        .route("/api/climate/{id}", get(handle_get))
        .route("/api/climate/{id}/temperature", post(handle_set_temperature))
        .route("/api/climate/{id}/fan_mode", post(handle_set_fan_mode))
        .route("/api/climate/{id}/hvac_mode", post(handle_set_hvac_mode))
        .route("/api/climate/{id}/turn_on", post(handle_turn_on))
        .route("/api/climate/{id}/turn_off", post(handle_turn_off))
        .route("/api/climate/{id}/update", post(handle_update))
        .with_state(app_state)
}

fn apply_env_overrides(config: &mut BridgeConfig) {
    if let Ok(host) = std::env::var("MQTT_HOST") {
        config.mqtt.host = host;
    }
    if let Some(port) = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
    {
        config.mqtt.port = port;
    }
    if let Ok(user) = std::env::var("MQTT_USER") {
        config.mqtt.user = user;
        config.mqtt.pass = std::env::var("MQTT_PASS").unwrap_or_default();
    }
    if let Some(port) = std::env::var("BRIDGE_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
    {
        config.http_port = port;
    }
}

fn spawn_mqtt_loop(app_state: AppState, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) =
                        handle_mqtt_message(&app_state, &message.topic, message.payload.to_vec())
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

fn spawn_poll_loop(app_state: AppState, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;

            // Vendor calls block, so the whole poll runs off the async workers.
            let mut entities = app_state.entities.clone().lock_owned().await;
            let flipped = tokio::task::spawn_blocking(move || {
                entities
                    .iter_mut()
                    .filter_map(|entity| {
                        entity
                            .poll()
                            .then(|| (entity.climate.unique_id(), entity.available))
                    })
                    .collect::<Vec<_>>()
            })
            .await;

            match flipped {
                Ok(flipped) => {
                    for (id, available) in flipped {
                        publish_availability(&app_state.mqtt, &id, available).await;
                    }
                }
                Err(err) => warn!("poll task failed: {err}"),
            }
        }
    });
}

fn spawn_state_publish_loop(app_state: AppState, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;

            let views: Vec<_> = {
                let entities = app_state.entities.lock().await;
                entities.iter().map(BridgeEntity::view).collect()
            };
            for view in views {
                publish_state(&app_state.mqtt, &view).await;
            }
        }
    });
}

async fn publish_state(mqtt: &AsyncClient, view: &EntityView) {
    match serde_json::to_vec(view) {
        Ok(body) => {
            if let Err(err) = mqtt
                .publish(state_topic(&view.state.unique_id), QoS::AtLeastOnce, true, body)
                .await
            {
                warn!("failed to publish state for {}: {err}", view.state.unique_id);
            }
        }
        Err(err) => warn!("failed to serialize state payload: {err}"),
    }
}

async fn publish_availability(mqtt: &AsyncClient, unique_id: &str, available: bool) {
    let payload = if available { "online" } else { "offline" };
    if let Err(err) = mqtt
        .publish(availability_topic(unique_id), QoS::AtLeastOnce, true, payload)
        .await
    {
        warn!("failed to publish availability for {unique_id}: {err}");
    }
}

async fn handle_mqtt_message(
    app_state: &AppState,
    topic: &str,
    payload: Vec<u8>,
) -> anyhow::Result<()> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return Ok(());
    }

    let Some((id, command)) = parse_command_topic(topic) else {
        return Ok(());
    };
    let message = String::from_utf8(payload).context("non utf8 mqtt payload")?;

    let owned_command = command.to_string();
    let outcome = run_on_entity(app_state, id, move |entity| {
        apply_command(&mut entity.climate, &owned_command, &message).then(|| entity.view())
    })
    .await
    .context("device command task failed")?;

    match outcome {
        Some(Some(view)) => publish_state(&app_state.mqtt, &view).await,
        Some(None) => warn!("ignoring unsupported command {command} for {id}"),
        None => warn!("command for unknown device {id}"),
    }
    Ok(())
}

fn apply_command(climate: &mut AguaClimate<SimulatedStove>, command: &str, message: &str) -> bool {
    let message = message.trim();
    match command {
        CMD_MODE => match message.parse::<HvacMode>() {
            Ok(mode) => climate.set_hvac_mode(mode),
            Err(err) => warn!("{err}"),
        },
        CMD_TEMPERATURE => climate.set_temperature(message.parse::<f64>().ok()),
        CMD_FAN => climate.set_fan_mode(Some(message)),
        CMD_POWER => match message.to_ascii_lowercase().as_str() {
            "on" => climate.turn_on(),
            "off" => climate.turn_off(),
            _ => {}
        },
        _ => return false,
    }
    true
}

fn find_entity<'a>(entities: &'a mut [BridgeEntity], id: &str) -> Option<&'a mut BridgeEntity> {
    entities
        .iter_mut()
        .find(|entity| entity.climate.unique_id() == id)
}

async fn handle_list(State(state): State<AppState>) -> impl IntoResponse {
    let entities = state.entities.lock().await;
    let views: Vec<_> = entities.iter().map(BridgeEntity::view).collect();
    Json(views)
}

async fn handle_get(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let mut entities = state.entities.lock().await;
    match find_entity(&mut entities, &id) {
        Some(entity) => Json(entity.view()).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Unknown device"),
    }
}

async fn handle_set_temperature(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<TemperatureRequest>,
) -> impl IntoResponse {
    with_entity(&state, &id, move |entity| {
        entity.climate.set_temperature(request.temperature)
    })
    .await
}

async fn handle_set_fan_mode(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<FanModeRequest>,
) -> impl IntoResponse {
    with_entity(&state, &id, move |entity| {
        entity.climate.set_fan_mode(request.fan_mode.as_deref())
    })
    .await
}

async fn handle_set_hvac_mode(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<HvacModeRequest>,
) -> axum::response::Response {
    let mode = match request.hvac_mode.parse::<HvacMode>() {
        Ok(mode) => mode,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };
    with_entity(&state, &id, move |entity| entity.climate.set_hvac_mode(mode)).await
}

async fn handle_turn_on(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    with_entity(&state, &id, |entity| entity.climate.turn_on()).await
}

async fn handle_turn_off(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    with_entity(&state, &id, |entity| entity.climate.turn_off()).await
}

async fn handle_update(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let outcome = run_on_entity(&state, &id, |entity| {
        let flipped = entity.poll();
        let response = UpdateResponse {
            success: entity.available,
            entity: entity.view(),
        };
        (response, flipped)
    })
    .await;

    let (response, flipped) = match outcome {
        Ok(Some(outcome)) => outcome,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Unknown device"),
        Err(err) => return command_failed(err),
    };

    if flipped {
        publish_availability(&state.mqtt, &id, response.success).await;
    }
    Json(response).into_response()
}

// Vendor calls block, so device work runs on the blocking pool with the lock held.
async fn run_on_entity<T, F>(state: &AppState, id: &str, work: F) -> Result<Option<T>, JoinError>
where
    T: Send + 'static,
    F: FnOnce(&mut BridgeEntity) -> T + Send + 'static,
{
    let mut entities = state.entities.clone().lock_owned().await;
    let id = id.to_string();
    tokio::task::spawn_blocking(move || find_entity(&mut entities, &id).map(work)).await
}

async fn with_entity<F>(state: &AppState, id: &str, command: F) -> axum::response::Response
where
    F: FnOnce(&mut BridgeEntity) + Send + 'static,
{
    let outcome = run_on_entity(state, id, |entity| {
        command(entity);
        entity.view()
    })
    .await;

    match outcome {
        Ok(Some(view)) => {
            publish_state(&state.mqtt, &view).await;
            Json(view).into_response()
        }
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Unknown device"),
        Err(err) => command_failed(err),
    }
}

fn command_failed(err: JoinError) -> axum::response::Response {
    warn!("device command task failed: {err}");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Device command failed")
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

impl ConfigStore {
    fn new() -> Self {
        let data_dir = std::env::var("AGUAIOT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.aguaiot"));

        Self {
            path: Arc::new(data_dir.join("bridge.json")),
        }
    }

    async fn load(&self) -> anyhow::Result<BridgeConfig> {
        match tokio::fs::read(self.path.as_ref()).await {
            Ok(raw) => Ok(serde_json::from_slice::<BridgeConfig>(&raw)
                .with_context(|| format!("invalid config at {}", self.path.display()))?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BridgeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use aguaiot_common::{DeviceSource, HeatingDevice, HvacAction};
    use axum::body::to_bytes;

    use super::*;

    fn test_state(count: u8) -> (AppState, rumqttc::EventLoop) {
        let entities = SimulatedAccount::new(count)
            .devices()
            .into_iter()
            .map(|stove| BridgeEntity::new(AguaClimate::new(stove)))
            .collect();
        let (mqtt, eventloop) =
            AsyncClient::new(MqttOptions::new("aguaiot-bridge-test", "127.0.0.1", 1883), 16);
        (
            AppState {
                entities: Arc::new(Mutex::new(entities)),
                mqtt,
            },
            eventloop,
        )
    }

    #[test]
    fn mqtt_commands_drive_the_entity() {
        let mut climate = AguaClimate::new(SimulatedStove::new("sim-1", "Stove"));

        assert!(apply_command(&mut climate, CMD_FAN, "4\n"));
        assert_eq!(climate.fan_mode(), "4");

        assert!(apply_command(&mut climate, CMD_TEMPERATURE, "22.5"));
        assert_eq!(climate.target_temperature(), Some(22.5));

        assert!(apply_command(&mut climate, CMD_TEMPERATURE, "warm"));
        assert_eq!(climate.target_temperature(), Some(22.5));

        assert!(apply_command(&mut climate, CMD_MODE, "heat"));
        assert_eq!(climate.hvac_action(), HvacAction::Idle);

        assert!(apply_command(&mut climate, CMD_POWER, "OFF"));
        assert_eq!(climate.hvac_mode(), HvacMode::Off);

        assert!(!apply_command(&mut climate, "reboot", "now"));
    }

    #[test]
    fn entity_poll_tracks_availability() {
        let mut entity = BridgeEntity::new(AguaClimate::new(SimulatedStove::new("sim-1", "Stove")));
        assert!(entity.poll());
        assert!(entity.available);
        assert!(entity.last_update.is_some());
        assert!(!entity.poll());
    }

    #[test]
    fn view_serializes_flat() {
        let entity = BridgeEntity::new(AguaClimate::new(SimulatedStove::new("sim-1", "Stove")));
        let value = serde_json::to_value(entity.view()).unwrap();

        assert_eq!(value["unique_id"], "sim-1");
        assert_eq!(value["hvacMode"], "off");
        assert_eq!(value["fanModes"], serde_json::json!(["1", "2", "3", "4", "5"]));
        assert_eq!(value["available"], false);
        assert!(value["lastUpdate"].is_null());
    }

    fn registered(count: u8) -> Vec<BridgeEntity> {
        let config = BridgeConfig {
            simulated_devices: count,
            ..BridgeConfig::default()
        };
        let mut data = IntegrationData::default();
        data.insert(config.entry.unique_id.clone(), SimulatedAccount::new(count));
        register_entities(&data, &config).unwrap()
    }

    #[test]
    fn startup_announces_every_polled_device() {
        let mut entities = registered(2);

        assert_eq!(
            availability_snapshot(&entities),
            vec![("sim-1".to_string(), true), ("sim-2".to_string(), true)]
        );

        // Later polls of a healthy device are not changes, so only the
        // startup snapshot ever carries `online`.
        for _ in 0..5 {
            assert!(entities.iter_mut().all(|entity| !entity.poll()));
        }
    }

    #[test]
    fn registration_fails_for_unknown_entry() {
        let config = BridgeConfig::default();
        let data: IntegrationData<SimulatedAccount> = IntegrationData::default();
        assert!(register_entities(&data, &config).is_err());
    }

    #[tokio::test]
    async fn mqtt_command_runs_against_entity() {
        let (state, _eventloop) = test_state(1);

        handle_mqtt_message(&state, "aguaiot/sim-1/cmnd/fan", b"5".to_vec())
            .await
            .unwrap();
        handle_mqtt_message(&state, "aguaiot/missing/cmnd/fan", b"1".to_vec())
            .await
            .unwrap();
        handle_mqtt_message(&state, "aguaiot/sim-1/cmnd/reboot", b"now".to_vec())
            .await
            .unwrap();

        let entities = state.entities.lock().await;
        assert_eq!(entities[0].climate.device().set_power(), 5);
    }

    #[tokio::test]
    async fn fan_mode_request_updates_device() {
        let (state, _eventloop) = test_state(1);

        let response = handle_set_fan_mode(
            State(state.clone()),
            Path("sim-1".to_string()),
            Json(FanModeRequest {
                fan_mode: Some("2".to_string()),
            }),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let entities = state.entities.lock().await;
        assert_eq!(entities[0].climate.device().set_power(), 2);
    }

    #[tokio::test]
    async fn unknown_device_is_not_found() {
        let (state, _eventloop) = test_state(1);

        let response = handle_turn_on(State(state), Path("missing".to_string()))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(error["error"], "Unknown device");
    }

    #[tokio::test]
    async fn invalid_hvac_mode_is_rejected() {
        let (state, _eventloop) = test_state(1);

        let response = handle_set_hvac_mode(
            State(state.clone()),
            Path("sim-1".to_string()),
            Json(HvacModeRequest {
                hvac_mode: "turbo".to_string(),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let entities = state.entities.lock().await;
        assert_eq!(entities[0].climate.hvac_mode(), HvacMode::Off);
    }

    #[tokio::test]
    async fn update_request_reports_success() {
        let (state, _eventloop) = test_state(2);

        let response = handle_update(State(state.clone()), Path("sim-2".to_string()))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["unique_id"], "sim-2");
    }
}
