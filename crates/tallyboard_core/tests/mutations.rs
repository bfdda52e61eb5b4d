use std::sync::Arc;
use tallyboard_core::db::open_db_in_memory;
use tallyboard_core::{
    AdminMode, BoardService, CommitmentKind, Document, EngineError, LocationEdit, NewLocation,
    NullRemote, ReconciliationEngine, SqliteSnapshotStore, TabHub, ValidationError, ViewMode,
};

#[test]
fn adding_a_disciple_commitment_moves_totals_and_progress() {
    let service = bootstrapped_service();

    let doc = service.add_disciple_commitment(1, 5, "Ana").unwrap();

    assert_eq!(doc.total_commitments(CommitmentKind::Disciple), 5);
    assert_eq!(doc.location_total(CommitmentKind::Disciple, 1), Some(155));
    assert_eq!(doc.progress_percent(CommitmentKind::Disciple), 6.25);

    let entry = &doc.disciple_commitments[0];
    assert_eq!(entry.name, "Ana");
    assert_eq!(entry.amount, 5);
    assert_eq!(entry.location_id, 1);
    assert_eq!(entry.location_name, "Igreja Sede");
    assert!(!entry.id.is_empty());
}

#[test]
fn commitment_logs_are_newest_first_and_ids_are_unique() {
    let service = bootstrapped_service();

    service.add_disciple_commitment(1, 2, "Ana").unwrap();
    let doc = service.add_disciple_commitment(2, 3, "Bia").unwrap();

    assert_eq!(doc.disciple_commitments.len(), 2);
    assert_eq!(doc.disciple_commitments[0].name, "Bia");
    assert_eq!(doc.disciple_commitments[1].name, "Ana");
    assert_ne!(
        doc.disciple_commitments[0].id,
        doc.disciple_commitments[1].id
    );
}

#[test]
fn cell_commitments_use_their_own_log_and_goal() {
    let service = bootstrapped_service();

    let doc = service.add_cell_commitment(3, 4, "Carla").unwrap();

    assert!(doc.disciple_commitments.is_empty());
    assert_eq!(doc.total_commitments(CommitmentKind::Cell), 4);
    assert_eq!(doc.location_total(CommitmentKind::Cell, 3), Some(12));
    assert_eq!(doc.progress_percent(CommitmentKind::Cell), 10.0);
}

#[test]
fn location_name_snapshot_is_immune_to_later_renames() {
    let service = bootstrapped_service();

    service.add_disciple_commitment(1, 5, "Ana").unwrap();
    let doc = service
        .update_location(1, LocationEdit::Name("Sede Renomeada".to_string()))
        .unwrap();

    assert_eq!(doc.location(1).unwrap().name, "Sede Renomeada");
    assert_eq!(doc.disciple_commitments[0].location_name, "Igreja Sede");
}

#[test]
fn removing_a_location_cascades_over_both_commitment_logs() {
    let service = bootstrapped_service();

    service.add_disciple_commitment(2, 3, "Ana").unwrap();
    service.add_disciple_commitment(2, 4, "Bia").unwrap();
    service.add_cell_commitment(2, 1, "Carla").unwrap();
    service.add_disciple_commitment(1, 2, "Dora").unwrap();

    let doc = service.remove_location(2).unwrap();

    assert!(doc.location(2).is_none());
    assert!(doc
        .disciple_commitments
        .iter()
        .all(|entry| entry.location_id != 2));
    assert!(doc
        .cell_commitments
        .iter()
        .all(|entry| entry.location_id != 2));
    // Unrelated entries survive the cascade.
    assert_eq!(doc.disciple_commitments.len(), 1);
    assert_eq!(doc.disciple_commitments[0].name, "Dora");
}

#[test]
fn commitment_arguments_are_validated_before_any_state_change() {
    let service = bootstrapped_service();

    let blank = service.add_disciple_commitment(1, 5, "   ").unwrap_err();
    assert!(matches!(
        blank,
        EngineError::Validation(ValidationError::EmptyName { .. })
    ));

    let zero = service.add_disciple_commitment(1, 0, "Ana").unwrap_err();
    assert!(matches!(
        zero,
        EngineError::Validation(ValidationError::AmountOutOfRange { amount: 0 })
    ));

    let oversized = service.add_disciple_commitment(1, 101, "Ana").unwrap_err();
    assert!(matches!(
        oversized,
        EngineError::Validation(ValidationError::AmountOutOfRange { amount: 101 })
    ));

    let missing = service.add_disciple_commitment(99, 5, "Ana").unwrap_err();
    assert!(matches!(
        missing,
        EngineError::Validation(ValidationError::UnknownLocation { location_id: 99 })
    ));

    assert_eq!(service.current().unwrap(), Document::initial());
}

#[test]
fn commitment_name_is_trimmed_before_it_is_recorded() {
    let service = bootstrapped_service();

    let doc = service.add_disciple_commitment(1, 1, "  Ana  ").unwrap();
    assert_eq!(doc.disciple_commitments[0].name, "Ana");
}

#[test]
fn removing_a_commitment_deletes_exactly_that_entry() {
    let service = bootstrapped_service();

    service.add_disciple_commitment(1, 2, "Ana").unwrap();
    let doc = service.add_disciple_commitment(1, 3, "Bia").unwrap();
    let target = doc.disciple_commitments[1].id.clone();

    let doc = service
        .remove_commitment(CommitmentKind::Disciple, &target)
        .unwrap();

    assert_eq!(doc.disciple_commitments.len(), 1);
    assert_eq!(doc.disciple_commitments[0].name, "Bia");

    let unknown = service
        .remove_commitment(CommitmentKind::Disciple, "no-such-id")
        .unwrap_err();
    assert!(matches!(
        unknown,
        EngineError::Validation(ValidationError::UnknownCommitment { .. })
    ));
}

#[test]
fn added_location_gets_the_next_stable_id() {
    let service = bootstrapped_service();

    let doc = service
        .add_location(NewLocation {
            name: "  Nova Base  ".to_string(),
            region: "".to_string(),
            base_disciples: 12,
            base_cells: 3,
            full_name: None,
            address: None,
            pastors: None,
        })
        .unwrap();

    let added = doc.location(4).expect("new location should get id 4");
    assert_eq!(added.name, "Nova Base");
    assert_eq!(added.region, "Other");
    assert_eq!(added.base_disciples, 12);

    // Assignment is max(existing) + 1, so removing the newest location frees
    // its id for the next add.
    service.remove_location(4).unwrap();
    let doc = service
        .add_location(NewLocation {
            name: "Outra Base".to_string(),
            region: "West".to_string(),
            base_disciples: 0,
            base_cells: 0,
            full_name: None,
            address: None,
            pastors: None,
        })
        .unwrap();
    assert_eq!(doc.location(4).unwrap().name, "Outra Base");
}

#[test]
fn add_location_rejects_a_blank_name() {
    let service = bootstrapped_service();

    let err = service
        .add_location(NewLocation {
            name: "   ".to_string(),
            region: "Main".to_string(),
            base_disciples: 0,
            base_cells: 0,
            full_name: None,
            address: None,
            pastors: None,
        })
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::EmptyName { .. })
    ));
}

#[test]
fn update_location_edits_one_field_at_a_time() {
    let service = bootstrapped_service();

    service
        .update_location(2, LocationEdit::BaseDisciples(75))
        .unwrap();
    service
        .update_location(2, LocationEdit::Address(Some("Av. Nova, 1".to_string())))
        .unwrap();
    let doc = service
        .update_location(2, LocationEdit::Pastors(None))
        .unwrap();

    let loc = doc.location(2).unwrap();
    assert_eq!(loc.base_disciples, 75);
    assert_eq!(loc.address.as_deref(), Some("Av. Nova, 1"));
    assert_eq!(loc.pastors, None);

    let blank = service
        .update_location(2, LocationEdit::Name(" ".to_string()))
        .unwrap_err();
    assert!(matches!(
        blank,
        EngineError::Validation(ValidationError::EmptyName { .. })
    ));

    let missing = service
        .update_location(42, LocationEdit::BaseCells(1))
        .unwrap_err();
    assert!(matches!(
        missing,
        EngineError::Validation(ValidationError::UnknownLocation { location_id: 42 })
    ));
}

#[test]
fn goals_below_one_are_rejected() {
    let service = bootstrapped_service();

    let err = service.set_disciple_goal(0).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::GoalOutOfRange { goal: 0 })
    ));

    service.set_disciple_goal(200).unwrap();
    service.set_cell_goal(60).unwrap();
    let doc = service.current().unwrap();
    assert_eq!(doc.disciple_goal, 200);
    assert_eq!(doc.cell_goal, 60);
}

#[test]
fn view_and_admin_modes_are_replicated_fields() {
    let service = bootstrapped_service();

    service.set_view_mode(ViewMode::Construction).unwrap();
    let doc = service.set_admin_mode(AdminMode::Advanced).unwrap();

    assert_eq!(doc.view_mode, ViewMode::Construction);
    assert_eq!(doc.admin_mode, AdminMode::Advanced);
}

#[test]
fn reset_restores_the_seeded_document() {
    let service = bootstrapped_service();

    service.add_disciple_commitment(1, 5, "Ana").unwrap();
    service.set_disciple_goal(500).unwrap();
    service.set_view_mode(ViewMode::Construction).unwrap();

    let doc = service.reset().unwrap();

    assert_eq!(doc, Document::initial());
}

#[test]
fn recomputed_totals_always_match_the_logs() {
    let service = bootstrapped_service();

    service.add_disciple_commitment(1, 5, "Ana").unwrap();
    service.add_disciple_commitment(2, 7, "Bia").unwrap();
    service.add_cell_commitment(1, 2, "Carla").unwrap();
    let doc = service.add_disciple_commitment(1, 1, "Dora").unwrap();

    let logged: u64 = doc
        .disciple_commitments
        .iter()
        .map(|entry| u64::from(entry.amount))
        .sum();
    assert_eq!(doc.total_commitments(CommitmentKind::Disciple), logged);
    assert_eq!(logged, 13);

    let base_sum: u64 = doc
        .locations
        .iter()
        .map(|loc| u64::from(loc.base_disciples))
        .sum();
    assert_eq!(doc.grand_total(CommitmentKind::Disciple), base_sum + logged);
}

fn bootstrapped_service() -> BoardService {
    let store = SqliteSnapshotStore::try_new(open_db_in_memory().unwrap()).unwrap();
    let engine = Arc::new(ReconciliationEngine::new(
        Box::new(store),
        Box::new(TabHub::new().endpoint()),
        Box::new(NullRemote::new()),
    ));
    engine.bootstrap();
    BoardService::new(engine)
}
