//! Display policy configuration
//!
//! Settings are read by every dispatch and only written when an administrator
//! reconfigures the process. Readers always get a whole [`ConfigSnapshot`];
//! a snapshot is never observed half-updated.

use crate::error::{DispatchError, Result};
use crate::resource::ResourceRef;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};
use strum_macros::{Display, EnumIter, EnumString};

pub const UNEXPECTED_ERROR_DISPLAY: &str = "CATCHPOINT_UNEXPECTED_ERROR_DISPLAY";
pub const ASYNC_FAILURE_STRATEGY: &str = "CATCHPOINT_ASYNC_FAILURE_STRATEGY";
pub const RUNTIME_MODE: &str = "CATCHPOINT_RUNTIME_MODE";
pub const EXPIRED_RESOURCE: &str = "CATCHPOINT_EXPIRED_RESOURCE";
pub const ACCESS_DENIED_RESOURCE: &str = "CATCHPOINT_ACCESS_DENIED_RESOURCE";
pub const INTERNAL_ERROR_RESOURCE: &str = "CATCHPOINT_INTERNAL_ERROR_RESOURCE";

const ENV_PREFIX: &str = "CATCHPOINT_";

/// How much detail an unexpected failure shows to the end user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UnexpectedErrorDisplay {
    /// Render a diagnostic page with the failure and its cause chain.
    DiagnosticPage,
    /// Render the configured generic internal-error resource.
    GenericErrorPage,
    /// Answer with a bare 500.
    StatusOnly,
}

/// What an asynchronous (partial update) request gets when it fails.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AsyncFailureStrategy {
    /// Classify the failure like any other request.
    #[default]
    PropagateToClassifier,
    /// Answer with a bare 500 and let the client-side failure handler run.
    StatusOnly,
}

/// Whether the process runs with development conveniences or hardened.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RuntimeMode {
    #[default]
    Development,
    Deployment,
}

impl RuntimeMode {
    pub fn is_hardened(self) -> bool {
        self == RuntimeMode::Deployment
    }

    /// Unexpected-error display used when none is configured.
    pub fn default_display(self) -> UnexpectedErrorDisplay {
        match self {
            RuntimeMode::Development => UnexpectedErrorDisplay::DiagnosticPage,
            RuntimeMode::Deployment => UnexpectedErrorDisplay::GenericErrorPage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayPolicy {
    pub unexpected_error_display: UnexpectedErrorDisplay,
    #[serde(default)]
    pub async_failure_strategy: AsyncFailureStrategy,
}

impl DisplayPolicy {
    pub fn for_mode(mode: RuntimeMode) -> Self {
        Self {
            unexpected_error_display: mode.default_display(),
            async_failure_strategy: AsyncFailureStrategy::default(),
        }
    }
}

/// Application-level resources rendered for expected failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResources {
    pub expired: ResourceRef,
    pub access_denied: ResourceRef,
    pub internal_error: ResourceRef,
}

impl Default for ErrorResources {
    fn default() -> Self {
        Self {
            expired: ResourceRef::new("/error/expired"),
            access_denied: ResourceRef::new("/error/access-denied"),
            internal_error: ResourceRef::new("/error/internal"),
        }
    }
}

/// Everything the dispatcher reads from configuration, as one consistent value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    #[serde(default)]
    pub mode: RuntimeMode,
    pub policy: DisplayPolicy,
    #[serde(default)]
    pub resources: ErrorResources,
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self::for_mode(RuntimeMode::default())
    }
}

impl ConfigSnapshot {
    pub fn for_mode(mode: RuntimeMode) -> Self {
        Self {
            mode,
            policy: DisplayPolicy::for_mode(mode),
            resources: ErrorResources::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| DispatchError::config_unavailable(e.to_string()))
    }

    pub fn with_display(mut self, display: UnexpectedErrorDisplay) -> Self {
        self.policy.unexpected_error_display = display;
        self
    }

    pub fn with_async_strategy(mut self, strategy: AsyncFailureStrategy) -> Self {
        self.policy.async_failure_strategy = strategy;
        self
    }
}

/// Source of configuration snapshots.
///
/// Implementations must hand out consistent snapshots; the dispatcher does no
/// locking of its own.
pub trait ConfigStore: Send + Sync {
    fn snapshot(&self) -> Result<Arc<ConfigSnapshot>>;
}

/// A store that never changes.
#[derive(Debug, Clone, Default)]
pub struct StaticConfig {
    snapshot: Arc<ConfigSnapshot>,
}

impl StaticConfig {
    pub fn new(snapshot: ConfigSnapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
        }
    }
}

impl ConfigStore for StaticConfig {
    fn snapshot(&self) -> Result<Arc<ConfigSnapshot>> {
        Ok(Arc::clone(&self.snapshot))
    }
}

/// Key/value configuration service
///
/// Raw settings live in a `DashMap`; every successful [`set`](ConfigService::set)
/// rebuilds the typed snapshot and swaps it in whole.
#[derive(Debug, Clone)]
pub struct ConfigService {
    values: Arc<DashMap<String, String>>,
    current: Arc<RwLock<Arc<ConfigSnapshot>>>,
}

impl Default for ConfigService {
    fn default() -> Self {
        Self {
            values: Arc::new(DashMap::new()),
            current: Arc::new(RwLock::new(Arc::new(ConfigSnapshot::default()))),
        }
    }
}

impl ConfigService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `CATCHPOINT_*` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::from_pairs(env::vars().filter(|(key, _)| key.starts_with(ENV_PREFIX)))
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let service = Self::default();
        for (key, value) in pairs {
            service.values.insert(key.into(), value.into());
        }
        let snapshot = Arc::new(service.parse()?);
        *service.current.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
        Ok(service)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|v| v.clone())
    }

    /// Change a setting. An invalid value is rejected and leaves the current
    /// snapshot untouched.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let previous = self.values.insert(key.to_string(), value.to_string());
        match self.parse() {
            Ok(snapshot) => *current = Arc::new(snapshot),
            Err(e) => {
                match previous {
                    Some(previous) => self.values.insert(key.to_string(), previous),
                    None => self.values.remove(key).map(|(_, v)| v),
                };
                return Err(e);
            }
        }
        drop(current);
        tracing::info!(key, value, "Configuration updated");
        Ok(())
    }

    fn parse(&self) -> Result<ConfigSnapshot> {
        let mode = self.parse_setting::<RuntimeMode>(RUNTIME_MODE)?.unwrap_or_default();
        let unexpected_error_display = self
            .parse_setting::<UnexpectedErrorDisplay>(UNEXPECTED_ERROR_DISPLAY)?
            .unwrap_or_else(|| mode.default_display());
        let async_failure_strategy = self
            .parse_setting::<AsyncFailureStrategy>(ASYNC_FAILURE_STRATEGY)?
            .unwrap_or_default();

        let defaults = ErrorResources::default();
        let resource = |key: &str, fallback: ResourceRef| {
            self.get(key).map(ResourceRef::new).unwrap_or(fallback)
        };

        Ok(ConfigSnapshot {
            mode,
            policy: DisplayPolicy {
                unexpected_error_display,
                async_failure_strategy,
            },
            resources: ErrorResources {
                expired: resource(EXPIRED_RESOURCE, defaults.expired),
                access_denied: resource(ACCESS_DENIED_RESOURCE, defaults.access_denied),
                internal_error: resource(INTERNAL_ERROR_RESOURCE, defaults.internal_error),
            },
        })
    }

    fn parse_setting<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            Some(raw) => T::from_str(raw.trim())
                .map(Some)
                .map_err(|_| DispatchError::invalid_setting(key, raw)),
            None => Ok(None),
        }
    }
}

impl ConfigStore for ConfigService {
    fn snapshot(&self) -> Result<Arc<ConfigSnapshot>> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(&current))
    }
}
