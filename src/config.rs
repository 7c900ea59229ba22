#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    path::PathBuf,
    sync::{Arc, Mutex, OnceLock},
    time::Duration,
};

use tokio::runtime::{Builder, Runtime};

use crate::constants::{
    DEFAULT_PACKAGE_MANAGER, DEFAULT_RUNNER_NAME, ENV_PACKAGE_MANAGER, ENV_PACKAGES_DIR,
    ENV_RUN_TIMEOUT_SECS, ENV_RUNNER, ENV_WATCH_TIMEOUT_SECS,
};

/// Environment-derived settings shared across the crate. Captured once when
/// the configuration is first touched; later environment mutations are not
/// observed.
pub struct ConfigState {
    /// Runner binary override (a path, or a bare name for PATH lookup).
    runner_override: Option<String>,
    /// Binary name used to locate the runner when no override is set.
    runner_name:     String,
    /// Package-manager binary used for fixture installs.
    package_manager: String,
    /// Directory holding linkable local packages.
    packages_dir:    PathBuf,
    /// Deadline applied to one-shot subprocess runs.
    run_timeout:     Duration,
    /// Deadline applied to watch-mode waits.
    watch_timeout:   Duration,
}

impl ConfigState {
    /// Builds a configuration snapshot from the current environment.
    fn new() -> Self {
        let runner_override = std::env::var(ENV_RUNNER)
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let package_manager = std::env::var(ENV_PACKAGE_MANAGER)
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_PACKAGE_MANAGER.to_string());

        let packages_dir = std::env::var(ENV_PACKAGES_DIR)
            .ok()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("packages"));

        Self {
            runner_override,
            runner_name: DEFAULT_RUNNER_NAME.to_string(),
            package_manager,
            packages_dir,
            run_timeout: read_timeout_secs(ENV_RUN_TIMEOUT_SECS, 120),
            watch_timeout: read_timeout_secs(ENV_WATCH_TIMEOUT_SECS, 30),
        }
    }

    /// Returns the runner override, if one was configured.
    pub fn runner_override(&self) -> Option<&str> {
        self.runner_override.as_deref()
    }

    /// Returns the runner binary name used for PATH lookup.
    pub fn runner_name(&self) -> &str {
        &self.runner_name
    }

    /// Returns the package-manager binary name.
    pub fn package_manager(&self) -> &str {
        &self.package_manager
    }

    /// Returns the local packages directory.
    pub fn packages_dir(&self) -> &PathBuf {
        &self.packages_dir
    }

    /// Returns the one-shot subprocess deadline.
    pub fn run_timeout(&self) -> Duration {
        self.run_timeout
    }

    /// Returns the watch-mode wait deadline.
    pub fn watch_timeout(&self) -> Duration {
        self.watch_timeout
    }
}

/// Shared configuration handle used throughout the crate.
#[derive(Clone)]
pub struct ConfigHandle(Arc<ConfigState>);

impl std::ops::Deref for ConfigHandle {
    type Target = ConfigState;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Global storage for the lazily constructed configuration state.
static CONFIG_SLOT: OnceLock<Mutex<Option<Arc<ConfigState>>>> = OnceLock::new();

/// Returns the mutex guarding the global configuration slot.
fn slot() -> &'static Mutex<Option<Arc<ConfigState>>> {
    CONFIG_SLOT.get_or_init(|| Mutex::new(None))
}

/// Ensure the global configuration has been initialized and return a handle.
pub fn ensure_initialized() -> ConfigHandle {
    let mut guard = slot().lock().expect("config slot poisoned");
    if let Some(cfg) = guard.as_ref() {
        return ConfigHandle(Arc::clone(cfg));
    }

    let cfg = Arc::new(ConfigState::new());
    *guard = Some(Arc::clone(&cfg));
    ConfigHandle(cfg)
}

/// Returns the active configuration, initializing it on demand.
pub fn get() -> ConfigHandle {
    ensure_initialized()
}

/// Returns the configured runner override, if any.
pub fn runner_override() -> Option<String> {
    get().runner_override().map(str::to_owned)
}

/// Returns the runner binary name used for PATH lookup.
pub fn runner_name() -> String {
    get().runner_name().to_string()
}

/// Returns the configured package-manager binary name.
pub fn package_manager() -> String {
    get().package_manager().to_string()
}

/// Returns the configured local packages directory.
pub fn packages_dir() -> PathBuf {
    get().packages_dir().clone()
}

/// Returns the deadline applied to one-shot subprocess runs.
pub fn run_timeout() -> Duration {
    get().run_timeout()
}

/// Returns the deadline applied to watch-mode waits.
pub fn watch_timeout() -> Duration {
    get().watch_timeout()
}

/// Shared multi-thread runtime backing the blocking facades.
static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Returns the shared tokio runtime, building it on first use.
///
/// The blocking facades (`process::run`, `ContinuousRun::end_blocking`, ...)
/// join async work on this runtime; callers already inside an async context
/// should use the async surfaces directly instead.
pub fn runtime() -> &'static Runtime {
    RUNTIME.get_or_init(|| {
        Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("failed to build the shared tokio runtime")
    })
}

/// Parses an environment variable into a `Duration`, falling back to
/// `default_secs` when parsing fails or the variable is missing.
fn read_timeout_secs(env: &str, default_secs: u64) -> Duration {
    std::env::var(env)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default_secs))
}
