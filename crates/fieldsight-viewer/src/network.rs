//! Network client for backend communication
//!
//! Pose updates arrive over a WebSocket and land in a single-slot mailbox:
//! only the newest pose is kept, older unapplied poses are superseded. REST
//! fetches (field catalog, settings) run as spawned futures and hand their
//! results to Bevy through shared pending slots drained in Update.

use bevy::prelude::*;
use fieldsight_core::{FieldCalibration, FiducialLayout, PosePayload, RenderPose, SettingsDoc};
use serde::Deserialize;
use std::sync::{Arc, Mutex};

use crate::app::{FieldCatalog, FieldInfo, SelectedField};

pub struct NetworkPlugin;

/// Resource storing the daemon connection configuration
#[derive(Resource, Clone, Default)]
pub struct DaemonConfig {
    /// HTTP(S) base URL for REST API (e.g., "http://192.168.1.100:8080")
    pub http_url: String,
    /// WebSocket URL (e.g., "ws://192.168.1.100:8080/ws")
    pub ws_url: String,
}

impl DaemonConfig {
    /// Create config from URL query parameters or same-origin fallback
    #[cfg(target_arch = "wasm32")]
    pub fn from_browser() -> Self {
        let window = web_sys::window().expect("no window");
        let location = window.location();

        // Check for ?daemon= query parameter
        if let Ok(search) = location.search() {
            if let Some(daemon_param) = Self::parse_query_param(&search, "daemon") {
                tracing::info!("Using daemon from URL parameter: {}", daemon_param);
                return Self::from_daemon_address(&daemon_param);
            }
        }

        // Fall back to same-origin
        let host = location.host().unwrap_or_else(|_| "localhost:8080".to_string());
        let is_https = location.protocol().unwrap_or_default() == "https:";

        Self {
            http_url: format!("{}://{}", if is_https { "https" } else { "http" }, host),
            ws_url: format!("{}://{}/ws", if is_https { "wss" } else { "ws" }, host),
        }
    }

    /// Create config from a daemon address (host:port)
    pub fn from_daemon_address(addr: &str) -> Self {
        // If no protocol specified, default to http/ws
        let (http_url, ws_url) = if addr.starts_with("https://") || addr.starts_with("http://") {
            let http = addr.to_string();
            let ws = addr.replace("https://", "wss://").replace("http://", "ws://");
            (http, format!("{}/ws", ws))
        } else {
            // Assume plain address like "192.168.1.100:8080"
            (format!("http://{}", addr), format!("ws://{}/ws", addr))
        };

        Self { http_url, ws_url }
    }

    /// Parse a query parameter from a search string
    #[cfg(target_arch = "wasm32")]
    fn parse_query_param(search: &str, param: &str) -> Option<String> {
        let search = search.trim_start_matches('?');
        for pair in search.split('&') {
            let mut parts = pair.splitn(2, '=');
            if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
                if key == param {
                    // URL decode the value
                    return Some(value.replace("%3A", ":").replace("%2F", "/"));
                }
            }
        }
        None
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_browser() -> Self {
        Self::default()
    }
}

/// Messages from the server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    #[serde(rename = "pose")]
    Pose(PosePayload),
    #[serde(rename = "pong")]
    Pong,
}

/// Single-slot mailbox shared between the WebSocket callback and Bevy.
///
/// A write replaces whatever pose is waiting; the pacing system drains it
/// at frame boundaries. No queue, no backlog.
#[derive(Resource, Default, Clone)]
pub struct LatestPose(pub Arc<Mutex<Option<RenderPose>>>);

impl LatestPose {
    pub fn put(&self, pose: RenderPose) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(pose);
        }
    }

    pub fn take(&self) -> Option<RenderPose> {
        self.0.lock().ok().and_then(|mut slot| slot.take())
    }
}

/// WebSocket connection state
#[derive(Resource, Default)]
pub struct ChannelStatus {
    pub connected: bool,
}

/// Decode one inbound channel message into a render-frame pose.
///
/// Returns `None` for anything that is not a well-formed pose update:
/// unknown message types, malformed matrices, non-finite values. Invalid
/// payloads are dropped here so the render path never sees them.
pub fn decode_pose(text: &str, calibration: &FieldCalibration) -> Option<RenderPose> {
    let msg = match serde_json::from_str::<WsMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!("Ignoring unrecognized channel message: {}", e);
            return None;
        }
    };
    match msg {
        WsMessage::Pose(payload) => match calibration.render_from_source(&payload) {
            Ok(pose) => Some(pose),
            Err(e) => {
                tracing::warn!("Dropping invalid pose payload: {}", e);
                None
            }
        },
        WsMessage::Pong => None,
    }
}

/// Settings document state mirrored from the backend
#[derive(Resource, Default)]
pub struct SettingsState {
    pub doc: Option<SettingsDoc>,
    pub loading: bool,
    pub save_in_flight: bool,
    pub save_error: Option<String>,
}

/// Pending settings fetch result from async fetch
#[derive(Resource, Default)]
pub struct PendingSettings(pub Arc<Mutex<Option<Result<SettingsDoc, String>>>>);

/// Pending settings save result from async POST
#[derive(Resource, Default)]
pub struct PendingSaveResult(pub Arc<Mutex<Option<Result<(), String>>>>);

/// Pending field catalog from async fetch
#[derive(Resource, Default)]
pub struct PendingFields(pub Arc<Mutex<Option<Result<Vec<FieldInfo>, String>>>>);

/// Pending fiducial layout from async fetch
#[derive(Resource, Default)]
pub struct PendingLayout(pub Arc<Mutex<Option<FiducialLayout>>>);

impl Plugin for NetworkPlugin {
    fn build(&self, app: &mut App) {
        // Initialize daemon config from browser URL
        let daemon_config = DaemonConfig::from_browser();

        app.insert_resource(daemon_config)
            .init_resource::<LatestPose>()
            .init_resource::<ChannelStatus>()
            .init_resource::<SettingsState>()
            .init_resource::<PendingSettings>()
            .init_resource::<PendingSaveResult>()
            .init_resource::<PendingFields>()
            .init_resource::<PendingLayout>()
            .add_systems(Startup, (connect_websocket, fetch_fields, fetch_settings))
            .add_systems(
                Update,
                (process_fields, process_settings, process_save_result),
            );
    }
}

fn connect_websocket(
    mut status: ResMut<ChannelStatus>,
    latest: Res<LatestPose>,
    calibration: Res<crate::app::Calibration>,
    daemon_config: Res<DaemonConfig>,
) {
    // In WASM, we use web_sys WebSocket
    #[cfg(target_arch = "wasm32")]
    {
        use wasm_bindgen::prelude::*;
        use web_sys::{CloseEvent, ErrorEvent, MessageEvent, WebSocket};

        let ws_url = daemon_config.ws_url.clone();
        tracing::info!("Connecting to pose channel: {}", ws_url);

        match WebSocket::new(&ws_url) {
            Ok(ws) => {
                ws.set_binary_type(web_sys::BinaryType::Arraybuffer);

                let onopen = Closure::wrap(Box::new(move |_| {
                    tracing::info!("Pose channel connected");
                }) as Box<dyn FnMut(JsValue)>);
                ws.set_onopen(Some(onopen.as_ref().unchecked_ref()));
                onopen.forget();

                // Clone the mailbox for the callback
                let mailbox = LatestPose(latest.0.clone());
                let calib = calibration.0;
                let onmessage = Closure::wrap(Box::new(move |e: MessageEvent| {
                    if let Ok(text) = e.data().dyn_into::<js_sys::JsString>() {
                        let text: String = text.into();
                        if let Some(pose) = decode_pose(&text, &calib) {
                            mailbox.put(pose);
                        }
                    }
                }) as Box<dyn FnMut(MessageEvent)>);
                ws.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
                onmessage.forget();

                // On channel failure the marker freezes at its last pose;
                // reconnection is the operator reloading the page.
                let onerror = Closure::wrap(Box::new(move |e: ErrorEvent| {
                    tracing::error!("Pose channel error: {:?}", e.message());
                }) as Box<dyn FnMut(ErrorEvent)>);
                ws.set_onerror(Some(onerror.as_ref().unchecked_ref()));
                onerror.forget();

                let onclose = Closure::wrap(Box::new(move |e: CloseEvent| {
                    tracing::warn!("Pose channel closed: code {}", e.code());
                }) as Box<dyn FnMut(CloseEvent)>);
                ws.set_onclose(Some(onclose.as_ref().unchecked_ref()));
                onclose.forget();

                status.connected = true;
            }
            Err(e) => {
                tracing::error!("Failed to create WebSocket: {:?}", e);
            }
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = (&latest, &calibration, &daemon_config);
        status.connected = false;
        tracing::info!("WebSocket not available in native mode");
    }
}

/// Fetch the field catalog from the REST API on startup
fn fetch_fields(
    pending: Res<PendingFields>,
    daemon_config: Res<DaemonConfig>,
    mut catalog: ResMut<FieldCatalog>,
) {
    catalog.loading = true;

    #[cfg(target_arch = "wasm32")]
    {
        use wasm_bindgen_futures::spawn_local;

        let pending_clone = pending.0.clone();
        let base_url = daemon_config.http_url.clone();

        spawn_local(async move {
            let url = format!("{}/api/fields", base_url);
            tracing::info!("Fetching fields from: {}", url);

            let result = match gloo_net::http::Request::get(&url).send().await {
                Ok(response) => match response.text().await {
                    Ok(text) => serde_json::from_str::<Vec<FieldInfo>>(&text)
                        .map_err(|e| format!("bad field catalog: {e}")),
                    Err(e) => Err(format!("field catalog read failed: {e:?}")),
                },
                Err(e) => Err(format!("field catalog fetch failed: {e:?}")),
            };

            if let Ok(mut slot) = pending_clone.lock() {
                *slot = Some(result);
            }
        });
    }

    #[cfg(not(target_arch = "wasm32"))]
    let _ = (&pending, &daemon_config);
}

fn process_fields(
    pending: Res<PendingFields>,
    mut catalog: ResMut<FieldCatalog>,
    mut selected: ResMut<SelectedField>,
) {
    if let Ok(mut slot) = pending.0.lock() {
        if let Some(result) = slot.take() {
            catalog.loading = false;
            match result {
                Ok(fields) => {
                    // Auto-select the first field when none is active yet
                    if selected.0.is_none() {
                        selected.0 = fields.first().cloned();
                    }
                    catalog.fields = fields;
                }
                Err(e) => {
                    tracing::error!("Field catalog unavailable: {}", e);
                }
            }
        }
    }
}

/// Fetch the settings document from the backend on startup
fn fetch_settings(
    pending: Res<PendingSettings>,
    daemon_config: Res<DaemonConfig>,
    mut state: ResMut<SettingsState>,
) {
    state.loading = true;

    #[cfg(target_arch = "wasm32")]
    {
        use wasm_bindgen_futures::spawn_local;

        let pending_clone = pending.0.clone();
        let base_url = daemon_config.http_url.clone();

        spawn_local(async move {
            let url = format!("{}/api/settings", base_url);
            tracing::info!("Fetching settings from: {}", url);

            let result = match gloo_net::http::Request::get(&url).send().await {
                Ok(response) => match response.text().await {
                    Ok(text) => serde_json::from_str::<SettingsDoc>(&text)
                        .map_err(|e| format!("bad settings document: {e}")),
                    Err(e) => Err(format!("settings read failed: {e:?}")),
                },
                Err(e) => Err(format!("settings fetch failed: {e:?}")),
            };

            if let Ok(mut slot) = pending_clone.lock() {
                *slot = Some(result);
            }
        });
    }

    #[cfg(not(target_arch = "wasm32"))]
    let _ = (&pending, &daemon_config);
}

fn process_settings(pending: Res<PendingSettings>, mut state: ResMut<SettingsState>) {
    if let Ok(mut slot) = pending.0.lock() {
        if let Some(result) = slot.take() {
            state.loading = false;
            match result {
                Ok(doc) => state.doc = Some(doc),
                Err(e) => tracing::error!("Settings unavailable: {}", e),
            }
        }
    }
}

/// POST the settings document to the backend
pub fn post_settings(
    daemon_config: &DaemonConfig,
    doc: &SettingsDoc,
    pending: &PendingSaveResult,
) {
    #[cfg(target_arch = "wasm32")]
    {
        use wasm_bindgen_futures::spawn_local;

        let pending_clone = pending.0.clone();
        let base_url = daemon_config.http_url.clone();
        let body = match serde_json::to_string(doc) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Failed to encode settings: {}", e);
                return;
            }
        };

        spawn_local(async move {
            let url = format!("{}/api/settings", base_url);

            let result = match gloo_net::http::Request::post(&url)
                .header("Content-Type", "application/json")
                .body(body)
            {
                Ok(request) => match request.send().await {
                    Ok(response) if response.ok() => Ok(()),
                    Ok(response) => Err(format!("settings save rejected: {}", response.status())),
                    Err(e) => Err(format!("settings save failed: {e:?}")),
                },
                Err(e) => Err(format!("settings save failed: {e:?}")),
            };

            if let Ok(mut slot) = pending_clone.lock() {
                *slot = Some(result);
            }
        });
    }

    #[cfg(not(target_arch = "wasm32"))]
    let _ = (daemon_config, doc, pending);
}

fn process_save_result(
    pending: Res<PendingSaveResult>,
    mut state: ResMut<SettingsState>,
    mut banner: ResMut<crate::app::StatusBanner>,
) {
    if let Ok(mut slot) = pending.0.lock() {
        if let Some(result) = slot.take() {
            state.save_in_flight = false;
            match result {
                Ok(()) => {
                    state.save_error = None;
                    banner.error = None;
                }
                Err(e) => {
                    // Surfaced to the operator; they re-submit, no retry loop.
                    tracing::error!("Settings persist failed: {}", e);
                    state.save_error = Some(e.clone());
                    banner.error = Some(format!("Settings not saved: {e}"));
                }
            }
        }
    }
}

/// Fetch the fiducial layout document for a field package
pub fn fetch_layout(daemon_config: &DaemonConfig, layout_path: &str, pending: &PendingLayout) {
    #[cfg(target_arch = "wasm32")]
    {
        use wasm_bindgen_futures::spawn_local;

        let pending_clone = pending.0.clone();
        let url = format!("{}/{}", daemon_config.http_url, layout_path);

        spawn_local(async move {
            tracing::info!("Fetching fiducial layout from: {}", url);

            match gloo_net::http::Request::get(&url).send().await {
                Ok(response) => match response.text().await {
                    Ok(text) => match FiducialLayout::from_json(&text) {
                        Ok(layout) => {
                            if let Ok(mut slot) = pending_clone.lock() {
                                *slot = Some(layout);
                            }
                        }
                        Err(e) => tracing::error!("Bad fiducial layout: {}", e),
                    },
                    Err(e) => tracing::error!("Fiducial layout read failed: {:?}", e),
                },
                Err(e) => tracing::error!("Fiducial layout fetch failed: {:?}", e),
            }
        });
    }

    #[cfg(not(target_arch = "wasm32"))]
    let _ = (daemon_config, layout_path, pending);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daemon_config_from_plain_address() {
        let config = DaemonConfig::from_daemon_address("192.168.1.100:8080");
        assert_eq!(config.http_url, "http://192.168.1.100:8080");
        assert_eq!(config.ws_url, "ws://192.168.1.100:8080/ws");
    }

    #[test]
    fn test_daemon_config_keeps_https() {
        let config = DaemonConfig::from_daemon_address("https://field.local");
        assert_eq!(config.http_url, "https://field.local");
        assert_eq!(config.ws_url, "wss://field.local/ws");
    }

    #[test]
    fn test_decode_matrix_pose() {
        let calib = FieldCalibration::default();
        let text = r#"{
            "type": "pose",
            "data": {
                "transform_matrix": [
                    [1.0, 0.0, 0.0, 1.0],
                    [0.0, 1.0, 0.0, 2.0],
                    [0.0, 0.0, 1.0, 3.0],
                    [0.0, 0.0, 0.0, 1.0]
                ]
            }
        }"#;
        let pose = decode_pose(text, &calib).unwrap();
        assert_eq!(
            pose.translation(),
            [-7774.125, (3.0 - 4.025901) * 1000.0, -2000.0]
        );
    }

    #[test]
    fn test_decode_point_pose() {
        let calib = FieldCalibration::default();
        let text = r#"{"type":"pose","data":{"x":0.0,"y":0.0,"z":0.0}}"#;
        assert_eq!(
            decode_pose(text, &calib),
            Some(RenderPose::Position([-8774.125, -4025.901, 0.0]))
        );
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let calib = FieldCalibration::default();
        // Wrong matrix dimensions
        let text = r#"{"type":"pose","data":{"transform_matrix":[[1.0,0.0],[0.0,1.0]]}}"#;
        assert_eq!(decode_pose(text, &calib), None);
        // Non-finite value
        let text = r#"{"type":"pose","data":{"x":0.0,"y":"nope","z":0.0}}"#;
        assert_eq!(decode_pose(text, &calib), None);
        // Unknown message type
        assert_eq!(decode_pose(r#"{"type":"pong"}"#, &calib), None);
        // Not even JSON
        assert_eq!(decode_pose("garbage", &calib), None);
    }

    #[test]
    fn test_mailbox_supersedes() {
        let mailbox = LatestPose::default();
        mailbox.put(RenderPose::Position([1.0, 0.0, 0.0]));
        mailbox.put(RenderPose::Position([2.0, 0.0, 0.0]));
        // Only the newest pose survives
        assert_eq!(mailbox.take(), Some(RenderPose::Position([2.0, 0.0, 0.0])));
        assert_eq!(mailbox.take(), None);
    }
}
