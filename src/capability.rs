#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::sync::OnceLock;

use tracing::warn;
use which::which;

use crate::{config, error::HarnessError};

/// External tools a test may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    /// Mercurial, for version-control fixtures.
    Hg,
    /// Sapling, for version-control fixtures.
    Sl,
    /// Git, for version-control fixtures.
    Git,
    /// The configured package manager.
    PackageManager,
    /// The runner binary under test.
    Runner,
}

/// Name and availability of one probed tool.
#[derive(Debug, Clone)]
struct ToolStatus {
    /// The binary name that was probed.
    name:      String,
    /// Whether PATH lookup succeeded.
    available: bool,
}

impl ToolStatus {
    /// Probes `name` on PATH, warning once when it is missing.
    fn probe(name: &str) -> Self {
        let available = which(name).is_ok();
        if !available {
            warn!("{name} is not installed - some operations will be skipped");
        }
        Self {
            name: name.to_string(),
            available,
        }
    }
}

/// Availability of the external tools the harness can make use of, computed
/// once via explicit construction. Tests that depend on an optional tool
/// construct (or receive) one of these and skip themselves when the tool is
/// absent, instead of consulting hidden module state.
#[derive(Debug, Clone)]
pub struct Capabilities {
    /// Mercurial availability.
    hg:              ToolStatus,
    /// Sapling availability.
    sl:              ToolStatus,
    /// Git availability.
    git:             ToolStatus,
    /// Package-manager availability, under its configured name.
    package_manager: ToolStatus,
    /// Runner availability, under its configured name or override.
    runner:          ToolStatus,
}

impl Capabilities {
    /// Probes every tool the harness knows about.
    pub fn detect() -> Self {
        let runner_name = config::runner_override().unwrap_or_else(config::runner_name);
        Self {
            hg:              ToolStatus::probe("hg"),
            sl:              ToolStatus::probe("sl"),
            git:             ToolStatus::probe("git"),
            package_manager: ToolStatus::probe(&config::package_manager()),
            runner:          ToolStatus::probe(&runner_name),
        }
    }

    /// Returns the status record for `tool`.
    fn status(&self, tool: Tool) -> &ToolStatus {
        match tool {
            Tool::Hg => &self.hg,
            Tool::Sl => &self.sl,
            Tool::Git => &self.git,
            Tool::PackageManager => &self.package_manager,
            Tool::Runner => &self.runner,
        }
    }

    /// Whether `tool` resolved on PATH.
    pub fn has(&self, tool: Tool) -> bool {
        self.status(tool).available
    }

    /// Whether Mercurial is available.
    pub fn has_hg(&self) -> bool {
        self.hg.available
    }

    /// Whether Sapling is available.
    pub fn has_sl(&self) -> bool {
        self.sl.available
    }

    /// Whether Git is available.
    pub fn has_git(&self) -> bool {
        self.git.available
    }

    /// Errors with the probed name when `tool` is unavailable; guard clause
    /// for operations that cannot degrade.
    pub fn require(&self, tool: Tool) -> Result<(), HarnessError> {
        let status = self.status(tool);
        if status.available {
            Ok(())
        } else {
            Err(HarnessError::MissingTool {
                tool: status.name.clone(),
            })
        }
    }

    /// Name/availability pairs, for environment reports.
    pub fn statuses(&self) -> Vec<(String, bool)> {
        [
            &self.hg,
            &self.sl,
            &self.git,
            &self.package_manager,
            &self.runner,
        ]
        .into_iter()
        .map(|status| (status.name.clone(), status.available))
        .collect()
    }
}

/// Process-wide detection result for callers (like the CLI) that have no
/// test context to thread a `Capabilities` through.
pub fn capabilities() -> &'static Capabilities {
    static DETECTED: OnceLock<Capabilities> = OnceLock::new();
    DETECTED.get_or_init(Capabilities::detect)
}
