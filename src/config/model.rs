// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::engine::EngineOptions;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [engine]
/// lookback_days = 100
/// qualification_tolerance_hours = 6
/// group_by_recurrence = false
/// max_points_per_task = 3
///
/// [store]
/// data_dir = "./databases"
/// file_prefix = "database-"
/// ```
///
/// All sections and keys are optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub store: StoreSection,
}

/// `[engine]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    /// Days of history that count against a user when scoring.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Hours shaved off a task's interval before it is due again.
    #[serde(default = "default_tolerance_hours")]
    pub qualification_tolerance_hours: u32,

    /// Allocate weekly tasks before monthly ones, then one-shots.
    #[serde(default)]
    pub group_by_recurrence: bool,

    /// Cap on the penalty points one user may put on a single task.
    #[serde(default = "default_max_points_per_task")]
    pub max_points_per_task: u32,
}

fn default_lookback_days() -> u32 {
    100
}

fn default_tolerance_hours() -> u32 {
    6
}

fn default_max_points_per_task() -> u32 {
    3
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            qualification_tolerance_hours: default_tolerance_hours(),
            group_by_recurrence: false,
            max_points_per_task: default_max_points_per_task(),
        }
    }
}

/// `[store]` section: where tenant databases live.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Tenant `x` is stored in `{data_dir}/{file_prefix}x.sqlite`.
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./databases")
}

fn default_file_prefix() -> String {
    "database-".to_string()
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            file_prefix: default_file_prefix(),
        }
    }
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (or [`Default`]), so
/// holders can rely on the value ranges checked there.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    engine: EngineSection,
    store: StoreSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(engine: EngineSection, store: StoreSection) -> Self {
        Self { engine, store }
    }

    pub fn engine(&self) -> &EngineSection {
        &self.engine
    }

    pub fn store(&self) -> &StoreSection {
        &self.store
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            lookback_days: self.engine.lookback_days,
            qualification_tolerance_hours: self.engine.qualification_tolerance_hours,
            max_points_per_task: self.engine.max_points_per_task,
        }
    }

    pub(crate) fn force_group_by_recurrence(&mut self) {
        self.engine.group_by_recurrence = true;
    }
}
