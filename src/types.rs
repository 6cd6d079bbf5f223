use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How often a task definition comes around.
///
/// The derived ordering is also the batch order used when allocation is
/// grouped by recurrence: weekly tasks first, then monthly, then one-shots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceUnit {
    Weekly,
    Monthly,
    Once,
}

impl RecurrenceUnit {
    /// Days per unit used by the qualification rule.
    ///
    /// Months are approximated as 30 days.
    pub fn days_per_unit(self) -> i64 {
        match self {
            RecurrenceUnit::Weekly => 7,
            RecurrenceUnit::Monthly => 30,
            RecurrenceUnit::Once => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecurrenceUnit::Weekly => "weekly",
            RecurrenceUnit::Monthly => "monthly",
            RecurrenceUnit::Once => "once",
        }
    }
}

impl fmt::Display for RecurrenceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurrenceUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weekly" => Ok(RecurrenceUnit::Weekly),
            "monthly" => Ok(RecurrenceUnit::Monthly),
            "once" => Ok(RecurrenceUnit::Once),
            other => Err(format!(
                "invalid recurrence unit: {other} (expected \"once\", \"weekly\" or \"monthly\")"
            )),
        }
    }
}

/// Lifecycle status of a stored assignment row.
///
/// - `Waiting`: a later repetition of a task that repeats within one cycle.
/// - `Pending`: the currently active row for its task.
/// - the remaining variants are terminal until the next cycle archives them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Waiting,
    Pending,
    Completed,
    Skipped,
    Postponed,
    Failed,
}

impl AssignmentStatus {
    pub const ALL: [AssignmentStatus; 6] = [
        AssignmentStatus::Waiting,
        AssignmentStatus::Pending,
        AssignmentStatus::Completed,
        AssignmentStatus::Skipped,
        AssignmentStatus::Postponed,
        AssignmentStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentStatus::Waiting => "waiting",
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::Skipped => "skipped",
            AssignmentStatus::Postponed => "postponed",
            AssignmentStatus::Failed => "failed",
        }
    }

    /// Still open work: not yet resolved by the assignee.
    pub fn is_open(self) -> bool {
        matches!(self, AssignmentStatus::Waiting | AssignmentStatus::Pending)
    }

    /// The previous holder dropped the task; it should be re-offered.
    pub fn is_dropped(self) -> bool {
        matches!(self, AssignmentStatus::Postponed | AssignmentStatus::Failed)
    }

    /// Statuses that hand the "active" slot on to the next waiting row.
    pub fn releases_turn(self) -> bool {
        matches!(
            self,
            AssignmentStatus::Completed | AssignmentStatus::Skipped | AssignmentStatus::Postponed
        )
    }

    /// Statuses a user may set on an assignment of a task with the given
    /// recurrence unit and repeat count.
    pub fn allowed_for(unit: RecurrenceUnit, repeats_per_cycle: u32) -> Vec<AssignmentStatus> {
        Self::ALL
            .into_iter()
            .filter(|status| match status {
                // Reassignment is a week away at most; postponing is meaningless.
                AssignmentStatus::Postponed => unit != RecurrenceUnit::Weekly,
                AssignmentStatus::Skipped => unit != RecurrenceUnit::Once,
                AssignmentStatus::Waiting => repeats_per_cycle > 1,
                _ => true,
            })
            .collect()
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| format!("invalid assignment status: {wanted}"))
    }
}
