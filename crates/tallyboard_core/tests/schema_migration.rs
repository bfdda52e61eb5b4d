use serde_json::json;
use tallyboard_core::{
    migrate, migrate_str, AdminMode, CommitmentKind, Document, MigrationError, ViewMode,
    CURRENT_SCHEMA_VERSION,
};

#[test]
fn oldest_shape_splits_counter_into_baseline_with_empty_log() {
    let doc = migrate(&json!({
        "goal": 80,
        "totalDisciples": 30,
        "locations": [{"id": 1, "disciples": 30, "cells": 5}]
    }))
    .unwrap();

    assert_eq!(doc.schema_version, CURRENT_SCHEMA_VERSION);
    assert_eq!(doc.disciple_goal, 80);
    assert_eq!(doc.cell_goal, 40);
    assert_eq!(doc.view_mode, ViewMode::Reality);
    assert_eq!(doc.admin_mode, AdminMode::Basic);

    assert_eq!(doc.locations.len(), 1);
    assert_eq!(doc.locations[0].base_disciples, 30);
    assert_eq!(doc.locations[0].base_cells, 5);
    assert!(doc.disciple_commitments.is_empty());
    assert!(doc.cell_commitments.is_empty());
    // The old counter is both the baseline and the historical total.
    assert_eq!(doc.location_total(CommitmentKind::Disciple, 1), Some(30));
}

#[test]
fn legacy_commitment_history_is_carried_under_the_new_field_name() {
    let doc = migrate(&json!({
        "goal": 100,
        "viewMode": "construction",
        "locations": [{"id": 1, "name": "Sede", "region": "Main", "disciples": 40, "cells": 10}],
        "commitmentHistory": [{
            "id": "1700000000000",
            "name": "Ana",
            "amount": 3,
            "locationId": 1,
            "locationName": "Sede",
            "timestamp": 1_700_000_000_000_i64
        }]
    }))
    .unwrap();

    assert_eq!(doc.disciple_goal, 100);
    assert_eq!(doc.view_mode, ViewMode::Construction);
    assert_eq!(doc.disciple_commitments.len(), 1);
    let entry = &doc.disciple_commitments[0];
    assert_eq!(entry.id, "1700000000000");
    assert_eq!(entry.name, "Ana");
    assert_eq!(entry.amount, 3);
    assert_eq!(entry.location_id, 1);
    assert_eq!(entry.location_name, "Sede");
    assert_eq!(entry.timestamp, 1_700_000_000_000);
    assert!(doc.cell_commitments.is_empty());
}

#[test]
fn legacy_descriptive_fields_survive_migration() {
    let doc = migrate(&json!({
        "goal": 80,
        "locations": [{
            "id": 2,
            "name": "Zona Norte",
            "region": "North",
            "disciples": 50,
            "cells": 15,
            "fullName": "IEAB Zona Norte",
            "address": "Av. Norte, 456",
            "pastors": "Pr. Local"
        }]
    }))
    .unwrap();

    let loc = &doc.locations[0];
    assert_eq!(loc.full_name.as_deref(), Some("IEAB Zona Norte"));
    assert_eq!(loc.address.as_deref(), Some("Av. Norte, 456"));
    assert_eq!(loc.pastors.as_deref(), Some("Pr. Local"));
}

#[test]
fn legacy_payload_without_locations_falls_back_to_seeded_locations() {
    let doc = migrate(&json!({"goal": 90})).unwrap();

    assert_eq!(doc.disciple_goal, 90);
    assert_eq!(doc.locations, Document::initial().locations);
}

#[test]
fn migrating_a_current_document_is_an_identity_parse() {
    let mut original = Document::initial();
    original.disciple_goal = 123;

    let value = serde_json::to_value(&original).unwrap();
    let once = migrate(&value).unwrap();
    assert_eq!(once, original);

    let twice = migrate(&serde_json::to_value(&once).unwrap()).unwrap();
    assert_eq!(twice, once);
}

#[test]
fn migration_of_a_legacy_payload_is_idempotent() {
    let legacy = json!({
        "goal": 80,
        "locations": [{"id": 1, "name": "Sede", "disciples": 30, "cells": 5}],
        "commitmentHistory": [{"id": "1", "name": "Ana", "amount": 2, "locationId": 1,
                               "locationName": "Sede", "timestamp": 1_i64}]
    });

    let once = migrate(&legacy).unwrap();
    let twice = migrate(&serde_json::to_value(&once).unwrap()).unwrap();
    assert_eq!(twice, once);
}

#[test]
fn explicit_legacy_version_tag_still_takes_the_legacy_path() {
    let doc = migrate(&json!({
        "schemaVersion": 1,
        "goal": 80,
        "locations": [{"id": 1, "disciples": 10, "cells": 2}]
    }))
    .unwrap();

    assert_eq!(doc.schema_version, CURRENT_SCHEMA_VERSION);
    assert_eq!(doc.locations[0].base_disciples, 10);
}

#[test]
fn newer_schema_version_is_refused() {
    let err = migrate(&json!({"schemaVersion": 99})).unwrap_err();
    assert_eq!(
        err,
        MigrationError::UnsupportedVersion {
            found: 99,
            latest_supported: CURRENT_SCHEMA_VERSION
        }
    );
}

#[test]
fn malformed_payloads_yield_typed_errors() {
    assert_eq!(
        migrate(&json!(["not", "a", "document"])).unwrap_err(),
        MigrationError::NotAnObject
    );

    assert!(matches!(
        migrate(&json!({"schemaVersion": "two"})).unwrap_err(),
        MigrationError::InvalidField {
            field: "schemaVersion",
            ..
        }
    ));

    assert!(matches!(
        migrate(&json!({"goal": 80, "locations": "none"})).unwrap_err(),
        MigrationError::InvalidField {
            field: "locations",
            ..
        }
    ));

    assert!(matches!(
        migrate(&json!({"goal": 80, "locations": [{"disciples": 5}]})).unwrap_err(),
        MigrationError::InvalidField {
            field: "locations.id",
            ..
        }
    ));

    assert!(matches!(
        migrate(&json!({"viewMode": "projector", "locations": []})).unwrap_err(),
        MigrationError::InvalidField {
            field: "viewMode",
            ..
        }
    ));

    assert!(matches!(
        migrate_str("definitely not json").unwrap_err(),
        MigrationError::InvalidJson(_)
    ));
}
