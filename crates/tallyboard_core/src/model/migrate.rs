//! Schema migration for persisted and replicated documents.
//!
//! # Responsibility
//! - Accept every previously-shipped document shape and produce the current
//!   one without losing fields the current schema retains.
//! - Reject unknown or malformed payloads with a typed error, never a panic.
//!
//! # Invariants
//! - Migration is pure: same input, same output, no I/O.
//! - Migrating an already-current document is an identity parse.
//! - The oldest shapes carry no version tag; they are detected by the
//!   presence or absence of marker fields.

use crate::model::document::{
    AdminMode, CommitmentEntry, Document, Location, ViewMode, CURRENT_SCHEMA_VERSION,
    DEFAULT_CELL_GOAL, DEFAULT_DISCIPLE_GOAL,
};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type MigrationResult<T> = Result<T, MigrationError>;

/// Malformed or unknown persisted document shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationError {
    /// Payload is not a JSON object at the top level.
    NotAnObject,
    /// Payload is not parseable JSON at all.
    InvalidJson(String),
    /// Version tag is newer than this build understands.
    UnsupportedVersion {
        found: u32,
        latest_supported: u32,
    },
    /// A current-schema payload failed to decode.
    InvalidDocument(String),
    /// A legacy payload carries a field with an unusable value.
    InvalidField {
        field: &'static str,
        message: String,
    },
}

impl Display for MigrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "document payload is not a JSON object"),
            Self::InvalidJson(message) => write!(f, "document payload is not JSON: {message}"),
            Self::UnsupportedVersion {
                found,
                latest_supported,
            } => write!(
                f,
                "document schema version {found} is newer than supported {latest_supported}"
            ),
            Self::InvalidDocument(message) => write!(f, "invalid document payload: {message}"),
            Self::InvalidField { field, message } => {
                write!(f, "invalid value in legacy field `{field}`: {message}")
            }
        }
    }
}

impl Error for MigrationError {}

/// Parses a serialized document of any known schema into the current shape.
pub fn migrate_str(raw: &str) -> MigrationResult<Document> {
    let value: Value =
        serde_json::from_str(raw).map_err(|err| MigrationError::InvalidJson(err.to_string()))?;
    migrate(&value)
}

/// Migrates an untyped document payload into the current shape.
///
/// Versioned payloads decode directly; payloads without a `schemaVersion`
/// tag take the legacy path, where missing top-level fields fall back to the
/// seeded defaults the way the historical loader merged them.
pub fn migrate(raw: &Value) -> MigrationResult<Document> {
    let obj = raw.as_object().ok_or(MigrationError::NotAnObject)?;

    match obj.get("schemaVersion") {
        Some(version) => {
            let version = version.as_u64().ok_or_else(|| MigrationError::InvalidField {
                field: "schemaVersion",
                message: format!("expected an integer, got `{version}`"),
            })?;
            if version > u64::from(CURRENT_SCHEMA_VERSION) {
                return Err(MigrationError::UnsupportedVersion {
                    found: version as u32,
                    latest_supported: CURRENT_SCHEMA_VERSION,
                });
            }
            if version < u64::from(CURRENT_SCHEMA_VERSION) {
                // No shipped shape ever wrote an explicit older tag; treat a
                // hand-tagged legacy payload the same as an untagged one.
                return migrate_legacy(obj);
            }
            serde_json::from_value(raw.clone())
                .map_err(|err| MigrationError::InvalidDocument(err.to_string()))
        }
        None => migrate_legacy(obj),
    }
}

/// The pre-versioning family: one goal, one conflated counter per location,
/// and (in the later of the two shapes) a single `commitmentHistory` log.
fn migrate_legacy(obj: &Map<String, Value>) -> MigrationResult<Document> {
    let disciple_goal = match obj.get("goal") {
        Some(goal) => parse_u32("goal", goal)?.max(1),
        None => DEFAULT_DISCIPLE_GOAL,
    };

    let view_mode = match obj.get("viewMode") {
        Some(Value::String(mode)) => {
            ViewMode::parse(mode).ok_or_else(|| MigrationError::InvalidField {
                field: "viewMode",
                message: format!("unknown mode `{mode}`"),
            })?
        }
        Some(other) => {
            return Err(MigrationError::InvalidField {
                field: "viewMode",
                message: format!("expected a string, got `{other}`"),
            })
        }
        None => ViewMode::Reality,
    };

    let locations = match obj.get("locations") {
        Some(Value::Array(entries)) => entries
            .iter()
            .map(migrate_legacy_location)
            .collect::<MigrationResult<Vec<Location>>>()?,
        Some(other) => {
            return Err(MigrationError::InvalidField {
                field: "locations",
                message: format!("expected an array, got `{other}`"),
            })
        }
        // The historical loader merged partial payloads over the seeded
        // defaults, so an absent location list means the seeded one.
        None => Document::initial().locations,
    };

    // Marker field for the later legacy shape; absent in the oldest.
    let disciple_commitments = match obj.get("commitmentHistory") {
        Some(Value::Array(entries)) => entries
            .iter()
            .map(migrate_legacy_commitment)
            .collect::<MigrationResult<Vec<CommitmentEntry>>>()?,
        Some(other) => {
            return Err(MigrationError::InvalidField {
                field: "commitmentHistory",
                message: format!("expected an array, got `{other}`"),
            })
        }
        None => Vec::new(),
    };

    Ok(Document {
        schema_version: CURRENT_SCHEMA_VERSION,
        disciple_goal,
        cell_goal: DEFAULT_CELL_GOAL,
        view_mode,
        admin_mode: AdminMode::Basic,
        locations,
        disciple_commitments,
        cell_commitments: Vec::new(),
    })
}

/// Legacy locations stored a single running counter per metric; that counter
/// becomes the baseline and the historical total at once (zero prior
/// commitments are assumed for the baseline/total split).
fn migrate_legacy_location(value: &Value) -> MigrationResult<Location> {
    let obj = value.as_object().ok_or_else(|| MigrationError::InvalidField {
        field: "locations",
        message: "expected location objects".to_string(),
    })?;

    let id = parse_u32(
        "locations.id",
        obj.get("id").ok_or_else(|| MigrationError::InvalidField {
            field: "locations.id",
            message: "missing".to_string(),
        })?,
    )?;

    Ok(Location {
        id,
        name: string_or_default(obj.get("name")),
        region: string_or_default(obj.get("region")),
        base_disciples: opt_u32("locations.disciples", obj.get("disciples"))?.unwrap_or(0),
        base_cells: opt_u32("locations.cells", obj.get("cells"))?.unwrap_or(0),
        full_name: opt_string(obj.get("fullName")),
        address: opt_string(obj.get("address")),
        pastors: opt_string(obj.get("pastors")),
    })
}

fn migrate_legacy_commitment(value: &Value) -> MigrationResult<CommitmentEntry> {
    let obj = value.as_object().ok_or_else(|| MigrationError::InvalidField {
        field: "commitmentHistory",
        message: "expected commitment objects".to_string(),
    })?;

    // Historical ids were stringified timestamps; tolerate bare numbers too.
    let id = match obj.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => {
            return Err(MigrationError::InvalidField {
                field: "commitmentHistory.id",
                message: "missing or non-scalar".to_string(),
            })
        }
    };

    Ok(CommitmentEntry {
        id,
        name: string_or_default(obj.get("name")),
        amount: opt_u32("commitmentHistory.amount", obj.get("amount"))?.unwrap_or(0),
        location_id: opt_u32("commitmentHistory.locationId", obj.get("locationId"))?.unwrap_or(0),
        location_name: string_or_default(obj.get("locationName")),
        timestamp: obj.get("timestamp").and_then(Value::as_i64).unwrap_or(0),
    })
}

fn parse_u32(field: &'static str, value: &Value) -> MigrationResult<u32> {
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| MigrationError::InvalidField {
            field,
            message: format!("expected a non-negative integer, got `{value}`"),
        })
}

fn opt_u32(field: &'static str, value: Option<&Value>) -> MigrationResult<Option<u32>> {
    match value {
        Some(Value::Null) | None => Ok(None),
        Some(value) => parse_u32(field, value).map(Some),
    }
}

fn string_or_default(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

fn opt_string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}
