//! Board document domain model.
//!
//! # Responsibility
//! - Define the replicated aggregate: locations, goals, commitment logs.
//! - Recompute derived totals from the logs on every read.
//! - Validate document invariants after each engine transition.
//!
//! # Invariants
//! - `Location.id` values are unique within one document.
//! - `discipleGoal` and `cellGoal` are >= 1.
//! - Commitment logs are newest-first.
//! - A commitment referencing a removed location is a tolerated orphan and
//!   must never crash a reader; it is excluded from per-location totals.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Schema discriminator written into every serialized document.
///
/// The two older shapes never carried a version field; they are detected by
/// marker-field presence in [`crate::model::migrate`].
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Seeded disciple goal for fresh and migrated documents.
pub const DEFAULT_DISCIPLE_GOAL: u32 = 80;
/// Seeded cell goal; the legacy shapes had no cell goal to carry forward.
pub const DEFAULT_CELL_GOAL: u32 = 40;

/// Upper bound accepted for one commitment amount.
pub const MAX_COMMITMENT_AMOUNT: u32 = 100;

/// Presentation mode replicated with the document, consumed by the display
/// layer only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    Reality,
    Construction,
}

impl ViewMode {
    /// Stable wire/log string for this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reality => "reality",
            Self::Construction => "construction",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "reality" => Some(Self::Reality),
            "construction" => Some(Self::Construction),
            _ => None,
        }
    }
}

/// Admin surface mode, replicated for presentation like [`ViewMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminMode {
    Basic,
    Advanced,
}

impl AdminMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Advanced => "advanced",
        }
    }
}

/// Which commitment log an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentKind {
    Disciple,
    Cell,
}

impl CommitmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disciple => "disciple",
            Self::Cell => "cell",
        }
    }
}

/// A named site tracked by the board.
///
/// `base_disciples`/`base_cells` are the baseline counters; displayed totals
/// are baseline plus the matching commitment amounts, recomputed on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: u32,
    pub name: String,
    pub region: String,
    pub base_disciples: u32,
    pub base_cells: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pastors: Option<String>,
}

/// One pledged increment attributed to a location.
///
/// Immutable once created except for deletion. `location_name` is a snapshot
/// taken at creation time and is never updated if the location is renamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitmentEntry {
    pub id: String,
    pub name: String,
    pub amount: u32,
    pub location_id: u32,
    pub location_name: String,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
}

/// The single replicated aggregate.
///
/// Replicas always exchange whole documents; there is no field-level patch
/// anywhere in the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub schema_version: u32,
    pub disciple_goal: u32,
    pub cell_goal: u32,
    pub view_mode: ViewMode,
    pub admin_mode: AdminMode,
    pub locations: Vec<Location>,
    /// Newest-first.
    pub disciple_commitments: Vec<CommitmentEntry>,
    /// Newest-first.
    pub cell_commitments: Vec<CommitmentEntry>,
}

/// Invariant or mutation-argument violation.
///
/// The only error class that prevents an engine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyName { field: &'static str },
    AmountOutOfRange { amount: u32 },
    GoalOutOfRange { goal: u32 },
    UnknownLocation { location_id: u32 },
    UnknownCommitment { commitment_id: String },
    DuplicateLocationId { location_id: u32 },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName { field } => write!(f, "{field} must not be blank"),
            Self::AmountOutOfRange { amount } => write!(
                f,
                "commitment amount {amount} is outside 1..={MAX_COMMITMENT_AMOUNT}"
            ),
            Self::GoalOutOfRange { goal } => write!(f, "goal {goal} must be >= 1"),
            Self::UnknownLocation { location_id } => {
                write!(f, "location {location_id} does not exist")
            }
            Self::UnknownCommitment { commitment_id } => {
                write!(f, "commitment `{commitment_id}` does not exist")
            }
            Self::DuplicateLocationId { location_id } => {
                write!(f, "location id {location_id} appears more than once")
            }
        }
    }
}

impl Error for ValidationError {}

impl Document {
    /// Seeded document used for fresh installs and as the fallback when a
    /// persisted snapshot cannot be migrated.
    pub fn initial() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            disciple_goal: DEFAULT_DISCIPLE_GOAL,
            cell_goal: DEFAULT_CELL_GOAL,
            view_mode: ViewMode::Reality,
            admin_mode: AdminMode::Basic,
            locations: vec![
                Location {
                    id: 1,
                    name: "Igreja Sede".to_string(),
                    region: "Main".to_string(),
                    base_disciples: 150,
                    base_cells: 45,
                    full_name: Some("IEAB Sede Internacional".to_string()),
                    address: Some("Rua Exemplo, 123 - Centro".to_string()),
                    pastors: Some("Pr. Presidente & Pra. Exemplo".to_string()),
                },
                Location {
                    id: 2,
                    name: "Congregação Zona Norte".to_string(),
                    region: "North".to_string(),
                    base_disciples: 50,
                    base_cells: 15,
                    full_name: Some("IEAB Zona Norte".to_string()),
                    address: Some("Av. Norte, 456 - Bairro".to_string()),
                    pastors: Some("Pr. Local".to_string()),
                },
                Location {
                    id: 3,
                    name: "Congregação Transformação".to_string(),
                    region: "East".to_string(),
                    base_disciples: 30,
                    base_cells: 8,
                    full_name: Some("IEAB Transformação".to_string()),
                    address: Some("Rua Leste, 789 - Bairro".to_string()),
                    pastors: Some("Pr. Local 2".to_string()),
                },
            ],
            disciple_commitments: Vec::new(),
            cell_commitments: Vec::new(),
        }
    }

    /// Returns the commitment log for `kind`, newest-first.
    pub fn commitments(&self, kind: CommitmentKind) -> &[CommitmentEntry] {
        match kind {
            CommitmentKind::Disciple => &self.disciple_commitments,
            CommitmentKind::Cell => &self.cell_commitments,
        }
    }

    pub(crate) fn commitments_mut(&mut self, kind: CommitmentKind) -> &mut Vec<CommitmentEntry> {
        match kind {
            CommitmentKind::Disciple => &mut self.disciple_commitments,
            CommitmentKind::Cell => &mut self.cell_commitments,
        }
    }

    /// Returns the goal for `kind`.
    pub fn goal(&self, kind: CommitmentKind) -> u32 {
        match kind {
            CommitmentKind::Disciple => self.disciple_goal,
            CommitmentKind::Cell => self.cell_goal,
        }
    }

    pub fn location(&self, location_id: u32) -> Option<&Location> {
        self.locations.iter().find(|loc| loc.id == location_id)
    }

    /// Sum of all logged commitment amounts for `kind`, orphans included.
    pub fn total_commitments(&self, kind: CommitmentKind) -> u64 {
        self.commitments(kind)
            .iter()
            .map(|entry| u64::from(entry.amount))
            .sum()
    }

    /// Baseline plus matching commitment amounts for one location.
    ///
    /// Returns `None` when the location does not exist; orphaned commitments
    /// pointing at it are then simply not displayed anywhere.
    pub fn location_total(&self, kind: CommitmentKind, location_id: u32) -> Option<u64> {
        let location = self.location(location_id)?;
        let base = match kind {
            CommitmentKind::Disciple => location.base_disciples,
            CommitmentKind::Cell => location.base_cells,
        };
        let committed: u64 = self
            .commitments(kind)
            .iter()
            .filter(|entry| entry.location_id == location_id)
            .map(|entry| u64::from(entry.amount))
            .sum();
        Some(u64::from(base) + committed)
    }

    /// Sum of every location's derived total for `kind`.
    pub fn grand_total(&self, kind: CommitmentKind) -> u64 {
        self.locations
            .iter()
            .filter_map(|loc| self.location_total(kind, loc.id))
            .sum()
    }

    /// Progress of logged commitments against the goal, capped at 100.
    pub fn progress_percent(&self, kind: CommitmentKind) -> f64 {
        let total = self.total_commitments(kind) as f64;
        let goal = f64::from(self.goal(kind).max(1));
        (total / goal * 100.0).min(100.0)
    }

    /// Next stable location id: `max(existing) + 1`.
    pub fn next_location_id(&self) -> u32 {
        self.locations
            .iter()
            .map(|loc| loc.id)
            .max()
            .unwrap_or(0)
            .saturating_add(1)
    }

    /// Checks the invariants that must hold after every engine transition.
    ///
    /// Orphaned commitment references are tolerated by design and are not
    /// checked here.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.disciple_goal == 0 {
            return Err(ValidationError::GoalOutOfRange {
                goal: self.disciple_goal,
            });
        }
        if self.cell_goal == 0 {
            return Err(ValidationError::GoalOutOfRange {
                goal: self.cell_goal,
            });
        }

        let mut seen = std::collections::BTreeSet::new();
        for location in &self.locations {
            if !seen.insert(location.id) {
                return Err(ValidationError::DuplicateLocationId {
                    location_id: location.id,
                });
            }
        }

        Ok(())
    }
}
