mod common;

use assert_matches::assert_matches;
use assettrack_api::entities::equipment::{CriticalityTier, EquipmentStatus};
use assettrack_api::entities::equipment_audit_log::AuditEvent;
use assettrack_api::entities::equipment_maintenance::MaintenanceType;
use assettrack_api::entities::location::LocationType;
use assettrack_api::errors::ServiceError;
use assettrack_api::services::equipment::{RegisterEquipmentInput, UpdateEquipmentInput};
use assettrack_api::services::locations::CreateLocationInput;
use assettrack_api::services::maintenance::OpenMaintenanceInput;
use common::TestApp;

fn register_input(asset_code: &str) -> RegisterEquipmentInput {
    RegisterEquipmentInput {
        asset_code: asset_code.to_string(),
        name: format!("Asset {}", asset_code),
        description: None,
        category: Some("laptop".into()),
        criticality: CriticalityTier::Medium,
        location_id: None,
        custodian_user_id: None,
        owning_group_id: None,
        acquisition_date: None,
        metadata: None,
    }
}

#[tokio::test]
async fn registration_writes_a_registered_audit_entry() {
    let app = TestApp::new().await;
    app.seed_user("alice").await;

    let asset = app
        .state
        .services
        .equipment
        .register_equipment(register_input("EQ-100"), "alice")
        .await
        .expect("register should succeed");

    let (entries, total) = app
        .state
        .services
        .audit
        .history(asset.id, 1, 10)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(entries[0].event_type, AuditEvent::Registered);
    assert_eq!(entries[0].actor_user_id.as_deref(), Some("alice"));

    // Duplicate asset codes are rejected.
    let err = app
        .state
        .services
        .equipment
        .register_equipment(register_input("EQ-100"), "alice")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn edits_and_status_changes_are_audited_separately() {
    let app = TestApp::new().await;
    app.seed_user("alice").await;

    let asset = app
        .state
        .services
        .equipment
        .register_equipment(register_input("EQ-100"), "alice")
        .await
        .unwrap();

    app.state
        .services
        .equipment
        .update_equipment(
            asset.id,
            UpdateEquipmentInput {
                name: Some("Spectrum analyzer".into()),
                ..Default::default()
            },
            "alice",
        )
        .await
        .expect("update should succeed");

    let updated = app
        .state
        .services
        .equipment
        .change_status(asset.id, EquipmentStatus::Retired, "alice")
        .await
        .expect("status change should succeed");
    assert_eq!(updated.status, EquipmentStatus::Retired);

    let (entries, total) = app
        .state
        .services
        .audit
        .history(asset.id, 1, 10)
        .await
        .unwrap();
    assert_eq!(total, 3);
    let kinds: Vec<&AuditEvent> = entries.iter().map(|e| &e.event_type).collect();
    assert!(kinds.contains(&&AuditEvent::Registered));
    assert!(kinds.contains(&&AuditEvent::Edited));
    assert!(kinds.contains(&&AuditEvent::StatusChanged));
}

#[tokio::test]
async fn update_never_touches_location_or_custodian() {
    let app = TestApp::new().await;
    app.seed_user("alice").await;
    let hq = app.seed_location("HQ").await;
    let asset = app
        .seed_equipment("EQ-100", Some(hq.id), None, None)
        .await;

    app.state
        .services
        .equipment
        .update_equipment(
            asset.id,
            UpdateEquipmentInput {
                name: Some("Renamed".into()),
                category: Some(Some("monitor".into())),
                ..Default::default()
            },
            "alice",
        )
        .await
        .unwrap();

    let reloaded = app.reload_equipment(asset.id).await;
    assert_eq!(reloaded.location_id, Some(hq.id));
    assert_eq!(reloaded.custodian_user_id, None);
    assert_eq!(reloaded.name, "Renamed");
}

#[tokio::test]
async fn location_tree_rejects_cycles() {
    let app = TestApp::new().await;

    let root = app
        .state
        .services
        .locations
        .create_location(CreateLocationInput {
            name: "HQ".into(),
            location_type: LocationType::Headquarters,
            parent_id: None,
            timezone: None,
        })
        .await
        .unwrap();
    let floor = app
        .state
        .services
        .locations
        .create_location(CreateLocationInput {
            name: "Floor 2".into(),
            location_type: LocationType::Other,
            parent_id: Some(root.id),
            timezone: None,
        })
        .await
        .unwrap();
    let room = app
        .state
        .services
        .locations
        .create_location(CreateLocationInput {
            name: "Lab 201".into(),
            location_type: LocationType::Room,
            parent_id: Some(floor.id),
            timezone: None,
        })
        .await
        .unwrap();

    // root -> floor -> room; re-parenting root under room closes a cycle.
    let err = app
        .state
        .services
        .locations
        .set_parent(root.id, Some(room.id))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    // Self-parenting is rejected outright.
    let err = app
        .state
        .services
        .locations
        .set_parent(floor.id, Some(floor.id))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    // A legal re-parent still works.
    let moved = app
        .state
        .services
        .locations
        .set_parent(room.id, Some(root.id))
        .await
        .unwrap();
    assert_eq!(moved.parent_id, Some(root.id));
}

#[tokio::test]
async fn maintenance_cycle_flips_equipment_status_and_audits() {
    let app = TestApp::new().await;
    app.seed_user("tech").await;
    let asset = app.seed_equipment("EQ-100", None, None, None).await;

    let record = app
        .state
        .services
        .maintenance
        .open_maintenance(
            OpenMaintenanceInput {
                equipment_id: asset.id,
                maintenance_type: MaintenanceType::Preventive,
                scheduled_for: None,
                technician_user_id: Some("tech".into()),
            },
            "tech",
        )
        .await
        .expect("open maintenance should succeed");

    assert_eq!(
        app.reload_equipment(asset.id).await.status,
        EquipmentStatus::UnderMaintenance
    );

    let completed = app
        .state
        .services
        .maintenance
        .complete_maintenance(record.id, Some("replaced fan".into()), "tech")
        .await
        .expect("complete maintenance should succeed");
    assert!(completed.completed_at.is_some());
    assert_eq!(completed.result_note.as_deref(), Some("replaced fan"));

    assert_eq!(
        app.reload_equipment(asset.id).await.status,
        EquipmentStatus::Active
    );

    // Completing twice is illegal.
    let err = app
        .state
        .services
        .maintenance
        .complete_maintenance(record.id, None, "tech")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));

    // Audit trail: maintained entries plus the two status changes.
    let (entries, _) = app
        .state
        .services
        .audit
        .history(asset.id, 1, 20)
        .await
        .unwrap();
    let maintained = entries
        .iter()
        .filter(|e| e.event_type == AuditEvent::Maintained)
        .count();
    let status_changes = entries
        .iter()
        .filter(|e| e.event_type == AuditEvent::StatusChanged)
        .count();
    assert_eq!(maintained, 2);
    assert_eq!(status_changes, 2);
}
