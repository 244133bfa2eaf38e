//! Harness configuration.
//!
//! Everything a test run needs is carried in [`HarnessConfig`] and passed to
//! setup explicitly. Nothing here reads the process environment. Durations
//! are encoded as integer milliseconds in JSON.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uia_sync::{PollPolicy, DEFAULT_POLL_INTERVAL, DEFAULT_STABILITY_WINDOW};

use crate::error::{HarnessError, Result};

/// Environment variable the add-in reads its service URL from.
pub const DEFAULT_SERVICE_URL_VAR: &str = "TURBO_SPICE_SERVER";

/// Top-level configuration, usually loaded from a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub bridge: BridgeConfig,
    pub timeouts: Timeouts,
    pub ribbon: RibbonLayout,
}

impl HarnessConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| HarnessError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| HarnessError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// How to launch the bridge process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Program to run, e.g. `wine`, or the bridge exe itself on Windows.
    pub program: PathBuf,

    /// Arguments, e.g. the path of `uia-bridge.exe` when running under WINE.
    pub args: Vec<String>,

    /// Extra environment for the bridge and the host it launches.
    pub env: BTreeMap<String, String>,

    /// Service the add-in should talk to. Exported as `service_url_var`.
    pub service_url: Option<String>,

    pub service_url_var: String,

    pub working_dir: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("wine"),
            args: vec!["uia-bridge.exe".to_string()],
            env: BTreeMap::new(),
            service_url: None,
            service_url_var: DEFAULT_SERVICE_URL_VAR.to_string(),
            working_dir: None,
        }
    }
}

impl BridgeConfig {
    /// The full environment to hand the bridge process.
    pub fn environment(&self) -> BTreeMap<String, String> {
        let mut env = self.env.clone();
        if let Some(url) = &self.service_url {
            env.insert(self.service_url_var.clone(), url.clone());
        }
        env
    }
}

/// Names used to locate the add-in's ribbon tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RibbonLayout {
    pub tabs_container: String,
    pub tab_name: String,
    pub lower_ribbon: String,
}

impl Default for RibbonLayout {
    fn default() -> Self {
        Self {
            tabs_container: "Ribbon Tabs".to_string(),
            tab_name: "The AddIn".to_string(),
            lower_ribbon: "Lower Ribbon".to_string(),
        }
    }
}

/// Every timeout the harness uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    /// Login round trip, including the service call.
    #[serde(with = "millis")]
    pub authentication: Duration,
    #[serde(with = "millis")]
    pub find_ribbon_buttons: Duration,
    /// Pointer rest time before a ribbon click.
    #[serde(with = "millis")]
    pub ribbon_click_delay: Duration,
    /// Long enough for a tooltip to appear and settle.
    #[serde(with = "millis")]
    pub ribbon_tooltip_click_delay: Duration,
    #[serde(with = "millis")]
    pub ribbon_buttons_activated: Duration,
    /// Dialogs and grids filled from the web service.
    #[serde(with = "millis")]
    pub web_service_populate: Duration,
    #[serde(with = "millis")]
    pub dialog_cancel: Duration,
    #[serde(with = "millis")]
    pub dialog_init: Duration,
    #[serde(with = "millis")]
    pub control_state_update: Duration,
    #[serde(with = "millis")]
    pub grid_stability_window: Duration,
    /// Cell reads and writes while the host may be busy.
    #[serde(with = "millis")]
    pub host_operation: Duration,
    #[serde(with = "millis")]
    pub quit_grace: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            authentication: Duration::from_secs(60),
            find_ribbon_buttons: Duration::from_secs(2),
            ribbon_click_delay: Duration::from_secs(1),
            ribbon_tooltip_click_delay: Duration::from_secs(4),
            ribbon_buttons_activated: Duration::from_secs(20),
            web_service_populate: Duration::from_secs(30),
            dialog_cancel: Duration::from_secs(5),
            dialog_init: Duration::from_millis(500),
            control_state_update: Duration::from_secs(5),
            grid_stability_window: DEFAULT_STABILITY_WINDOW,
            host_operation: Duration::from_secs(5),
            quit_grace: Duration::from_secs(2),
        }
    }
}

impl Timeouts {
    /// Policy for `timeout` at the configured poll interval.
    pub fn policy(&self, timeout: Duration) -> PollPolicy {
        PollPolicy::new(timeout)
            .with_poll_interval(self.poll_interval)
            .with_stability_window(self.grid_stability_window)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
