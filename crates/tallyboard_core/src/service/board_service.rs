//! Mutation API for the replicated board document.
//!
//! # Responsibility
//! - Validate operation arguments before any state change.
//! - Express each operation as a pure next-document computation and submit
//!   it through the reconciliation engine.
//!
//! # Invariants
//! - Commitment names are trimmed and non-empty; amounts are
//!   1..=MAX_COMMITMENT_AMOUNT; goals are >= 1.
//! - Removing a location cascades over both commitment logs in the same
//!   transition.
//! - No method blocks on the network; the remote push completes out-of-band.

use crate::channel::Announcement;
use crate::engine::reconcile::{EngineResult, ReconciliationEngine, ReplacementOutcome};
use crate::model::document::{
    AdminMode, CommitmentEntry, CommitmentKind, Document, Location, ValidationError, ViewMode,
    MAX_COMMITMENT_AMOUNT,
};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Input for [`BoardService::add_location`]; the id is assigned by the
/// document (`max(existing) + 1`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLocation {
    pub name: String,
    pub region: String,
    pub base_disciples: u32,
    pub base_cells: u32,
    pub full_name: Option<String>,
    pub address: Option<String>,
    pub pastors: Option<String>,
}

/// One typed field edit for an existing location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationEdit {
    Name(String),
    Region(String),
    BaseDisciples(u32),
    BaseCells(u32),
    FullName(Option<String>),
    Address(Option<String>),
    Pastors(Option<String>),
}

/// Typed operations over the shared document, one per business action.
pub struct BoardService {
    engine: Arc<ReconciliationEngine>,
}

impl BoardService {
    pub fn new(engine: Arc<ReconciliationEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<ReconciliationEngine> {
        &self.engine
    }

    /// Snapshot of the current document.
    pub fn current(&self) -> EngineResult<Document> {
        self.engine.current()
    }

    pub fn add_disciple_commitment(
        &self,
        location_id: u32,
        amount: u32,
        name: &str,
    ) -> EngineResult<Document> {
        self.submit_commitment(CommitmentKind::Disciple, location_id, amount, name)
    }

    pub fn add_cell_commitment(
        &self,
        location_id: u32,
        amount: u32,
        name: &str,
    ) -> EngineResult<Document> {
        self.submit_commitment(CommitmentKind::Cell, location_id, amount, name)
    }

    /// Deletes one commitment entry by id.
    pub fn remove_commitment(
        &self,
        kind: CommitmentKind,
        commitment_id: &str,
    ) -> EngineResult<Document> {
        let current = self.engine.current()?;
        if !current
            .commitments(kind)
            .iter()
            .any(|entry| entry.id == commitment_id)
        {
            return Err(ValidationError::UnknownCommitment {
                commitment_id: commitment_id.to_string(),
            }
            .into());
        }

        let commitment_id = commitment_id.to_string();
        self.engine.apply_local_mutation(move |doc| {
            let mut next = doc.clone();
            next.commitments_mut(kind)
                .retain(|entry| entry.id != commitment_id);
            next
        })
    }

    /// Applies one field edit to an existing location.
    ///
    /// Renames do not touch the `location_name` snapshots already recorded
    /// in the commitment logs.
    pub fn update_location(&self, location_id: u32, edit: LocationEdit) -> EngineResult<Document> {
        let current = self.engine.current()?;
        if current.location(location_id).is_none() {
            return Err(ValidationError::UnknownLocation { location_id }.into());
        }
        let edit = match edit {
            LocationEdit::Name(name) => {
                let name = trimmed_non_empty(&name, "location name")?;
                LocationEdit::Name(name)
            }
            LocationEdit::Region(region) => LocationEdit::Region(region.trim().to_string()),
            other => other,
        };

        self.engine.apply_local_mutation(move |doc| {
            let mut next = doc.clone();
            if let Some(location) = next
                .locations
                .iter_mut()
                .find(|location| location.id == location_id)
            {
                match edit {
                    LocationEdit::Name(name) => location.name = name,
                    LocationEdit::Region(region) => location.region = region,
                    LocationEdit::BaseDisciples(value) => location.base_disciples = value,
                    LocationEdit::BaseCells(value) => location.base_cells = value,
                    LocationEdit::FullName(value) => location.full_name = value,
                    LocationEdit::Address(value) => location.address = value,
                    LocationEdit::Pastors(value) => location.pastors = value,
                }
            }
            next
        })
    }

    /// Adds a location with the next stable id.
    pub fn add_location(&self, new: NewLocation) -> EngineResult<Document> {
        let name = trimmed_non_empty(&new.name, "location name")?;
        let region = match new.region.trim() {
            "" => "Other".to_string(),
            region => region.to_string(),
        };

        self.engine.apply_local_mutation(move |doc| {
            let mut next = doc.clone();
            let id = next.next_location_id();
            next.locations.push(Location {
                id,
                name,
                region,
                base_disciples: new.base_disciples,
                base_cells: new.base_cells,
                full_name: new.full_name,
                address: new.address,
                pastors: new.pastors,
            });
            next
        })
    }

    /// Removes a location and, atomically in the same transition, every
    /// commitment entry referencing it in either log.
    pub fn remove_location(&self, location_id: u32) -> EngineResult<Document> {
        let current = self.engine.current()?;
        if current.location(location_id).is_none() {
            return Err(ValidationError::UnknownLocation { location_id }.into());
        }

        self.engine.apply_local_mutation(move |doc| {
            let mut next = doc.clone();
            next.locations.retain(|location| location.id != location_id);
            next.disciple_commitments
                .retain(|entry| entry.location_id != location_id);
            next.cell_commitments
                .retain(|entry| entry.location_id != location_id);
            next
        })
    }

    pub fn set_view_mode(&self, mode: ViewMode) -> EngineResult<Document> {
        self.engine.apply_local_mutation(move |doc| {
            let mut next = doc.clone();
            next.view_mode = mode;
            next
        })
    }

    pub fn set_admin_mode(&self, mode: AdminMode) -> EngineResult<Document> {
        self.engine.apply_local_mutation(move |doc| {
            let mut next = doc.clone();
            next.admin_mode = mode;
            next
        })
    }

    pub fn set_disciple_goal(&self, goal: u32) -> EngineResult<Document> {
        self.set_goal(CommitmentKind::Disciple, goal)
    }

    pub fn set_cell_goal(&self, goal: u32) -> EngineResult<Document> {
        self.set_goal(CommitmentKind::Cell, goal)
    }

    /// Replaces the whole document with the seeded initial state.
    ///
    /// A full replacement like any other transition, so replicas converge on
    /// the reset instead of keeping stale data.
    pub fn reset(&self) -> EngineResult<Document> {
        self.engine.apply_local_mutation(|_| Document::initial())
    }

    /// Forces a pull from the remote store.
    pub fn refresh(&self) -> EngineResult<ReplacementOutcome> {
        self.engine.manual_refresh()
    }

    fn submit_commitment(
        &self,
        kind: CommitmentKind,
        location_id: u32,
        amount: u32,
        name: &str,
    ) -> EngineResult<Document> {
        let name = trimmed_non_empty(name, "name")?;
        if amount < 1 || amount > MAX_COMMITMENT_AMOUNT {
            return Err(ValidationError::AmountOutOfRange { amount }.into());
        }

        let current = self.engine.current()?;
        let location_name = match current.location(location_id) {
            Some(location) => location.name.clone(),
            None => return Err(ValidationError::UnknownLocation { location_id }.into()),
        };

        let entry = CommitmentEntry {
            id: Uuid::new_v4().to_string(),
            name: name.clone(),
            amount,
            location_id,
            location_name: location_name.clone(),
            timestamp: now_epoch_ms(),
        };

        let applied = self.engine.apply_local_mutation(move |doc| {
            let mut next = doc.clone();
            next.commitments_mut(kind).insert(0, entry);
            next
        })?;

        self.engine.announce(&Announcement {
            text: format!("{name} +{amount}"),
            sub_text: Some(location_name),
        });

        Ok(applied)
    }

    fn set_goal(&self, kind: CommitmentKind, goal: u32) -> EngineResult<Document> {
        if goal < 1 {
            return Err(ValidationError::GoalOutOfRange { goal }.into());
        }
        self.engine.apply_local_mutation(move |doc| {
            let mut next = doc.clone();
            match kind {
                CommitmentKind::Disciple => next.disciple_goal = goal,
                CommitmentKind::Cell => next.cell_goal = goal,
            }
            next
        })
    }
}

fn trimmed_non_empty(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName { field });
    }
    Ok(trimmed.to_string())
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
