mod common;

use assert_matches::assert_matches;
use assettrack_api::commands::movements::{
    authorize_movement_command::AuthorizeMovementCommand,
    cancel_movement_command::CancelMovementCommand,
    execute_movement_command::ExecuteMovementCommand,
    request_movement_command::RequestMovementCommand,
};
use assettrack_api::entities::MovementStatus;
use assettrack_api::errors::ServiceError;
use common::TestApp;
use uuid::Uuid;

fn request_command(
    equipment_id: Uuid,
    target_location_id: Uuid,
    requested_by: &str,
    roles: &[&str],
) -> RequestMovementCommand {
    RequestMovementCommand {
        equipment_id,
        target_location_id,
        target_custodian_user_id: None,
        note: None,
        requested_by: requested_by.to_string(),
        requester_roles: roles.iter().map(|r| r.to_string()).collect(),
    }
}

#[tokio::test]
async fn approval_path_moves_equipment_and_leaves_ordered_audit_trail() {
    let app = TestApp::new().await;
    app.seed_user("alice").await;
    app.seed_user("bob").await;
    app.seed_global_admin("bob").await;

    let hq = app.seed_location("HQ").await;
    let branch = app.seed_location("Branch-2").await;
    let asset = app
        .seed_equipment("EQ-100", Some(hq.id), None, Some("laptop"))
        .await;
    app.seed_category_policy("laptop", true).await;

    // Request stays pending because the category policy demands approval.
    let movement = app
        .state
        .services
        .movements
        .request_movement(request_command(asset.id, branch.id, "alice", &[]))
        .await
        .expect("request should succeed");
    assert_eq!(movement.status, MovementStatus::Pending);
    assert_eq!(movement.origin_location_id, Some(hq.id));
    assert!(movement.authorized_by_user_id.is_none());

    // Asset untouched while the movement awaits authorization.
    assert_eq!(app.reload_equipment(asset.id).await.location_id, Some(hq.id));

    let movement = app
        .state
        .services
        .movements
        .authorize_movement(AuthorizeMovementCommand {
            movement_id: movement.id,
            approve: true,
            note: Some("ok to move".into()),
            authorized_by: "bob".into(),
        })
        .await
        .expect("authorize should succeed");
    assert_eq!(movement.status, MovementStatus::Approved);
    assert_eq!(movement.authorized_by_user_id.as_deref(), Some("bob"));
    assert!(movement.authorized_at.is_some());

    // Approval alone does not move the asset.
    assert_eq!(app.reload_equipment(asset.id).await.location_id, Some(hq.id));

    let movement = app
        .state
        .services
        .movements
        .execute_movement(ExecuteMovementCommand {
            movement_id: movement.id,
            executed_by: "bob".into(),
        })
        .await
        .expect("execute should succeed");
    assert_eq!(movement.status, MovementStatus::Completed);
    assert!(movement.executed_at.is_some());

    let asset_after = app.reload_equipment(asset.id).await;
    assert_eq!(asset_after.location_id, Some(branch.id));

    // Audit trail: requested, approved, completed, in chronological order.
    let (entries, total) = app
        .state
        .services
        .audit
        .history(asset.id, 1, 50)
        .await
        .expect("history should load");
    assert!(total >= 3);

    let mut actions: Vec<String> = entries
        .iter()
        .rev()
        .filter_map(|e| e.payload.as_ref())
        .filter_map(|p| p.get("action"))
        .filter_map(|a| a.as_str().map(str::to_string))
        .collect();
    actions.retain(|a| ["requested", "approved", "completed"].contains(&a.as_str()));
    assert_eq!(actions, vec!["requested", "approved", "completed"]);
}

#[tokio::test]
async fn auto_executes_when_matching_policy_waives_approval() {
    let app = TestApp::new().await;
    app.seed_user("alice").await;

    let hq = app.seed_location("HQ").await;
    let branch = app.seed_location("Branch-2").await;
    let asset = app
        .seed_equipment("EQ-100", Some(hq.id), None, Some("laptop"))
        .await;
    app.seed_category_policy("laptop", false).await;

    let movement = app
        .state
        .services
        .movements
        .request_movement(request_command(asset.id, branch.id, "alice", &[]))
        .await
        .expect("request should succeed");

    // Returned movement is already completed and the asset has moved.
    assert_eq!(movement.status, MovementStatus::Completed);
    assert!(movement.executed_at.is_some());
    assert_eq!(app.reload_equipment(asset.id).await.location_id, Some(branch.id));

    // Two audit entries, never one collapsed record.
    let (entries, _) = app
        .state
        .services
        .audit
        .history(asset.id, 1, 50)
        .await
        .expect("history should load");
    let actions: Vec<&str> = entries
        .iter()
        .rev()
        .filter_map(|e| e.payload.as_ref())
        .filter_map(|p| p.get("action"))
        .filter_map(|a| a.as_str())
        .collect();
    assert_eq!(actions, vec!["requested", "completed"]);
}

#[tokio::test]
async fn defaults_to_requiring_approval_when_no_policy_matches() {
    let app = TestApp::new().await;
    app.seed_user("alice").await;

    let hq = app.seed_location("HQ").await;
    let branch = app.seed_location("Branch-2").await;
    // No category, no policy rows at all: fail-safe demands approval.
    let asset = app.seed_equipment("EQ-100", Some(hq.id), None, None).await;

    let movement = app
        .state
        .services
        .movements
        .request_movement(request_command(asset.id, branch.id, "alice", &[]))
        .await
        .expect("request should succeed");
    assert_eq!(movement.status, MovementStatus::Pending);
    assert_eq!(app.reload_equipment(asset.id).await.location_id, Some(hq.id));
}

#[tokio::test]
async fn role_policy_can_waive_approval_for_matching_requester() {
    let app = TestApp::new().await;
    app.seed_user("alice").await;

    let hq = app.seed_location("HQ").await;
    let branch = app.seed_location("Branch-2").await;
    let asset = app.seed_equipment("EQ-100", Some(hq.id), None, None).await;
    app.seed_role_policy("facilities", false).await;

    // Requester without the role falls back to the fail-safe default.
    let pending = app
        .state
        .services
        .movements
        .request_movement(request_command(asset.id, branch.id, "alice", &["engineering"]))
        .await
        .expect("request should succeed");
    assert_eq!(pending.status, MovementStatus::Pending);

    // Requester holding the role auto-executes.
    let other_branch = app.seed_location("Branch-3").await;
    let completed = app
        .state
        .services
        .movements
        .request_movement(request_command(
            asset.id,
            other_branch.id,
            "alice",
            &["facilities"],
        ))
        .await
        .expect("request should succeed");
    assert_eq!(completed.status, MovementStatus::Completed);
}

#[tokio::test]
async fn rejects_invalid_targets_and_unknown_ids() {
    let app = TestApp::new().await;
    app.seed_user("alice").await;

    let hq = app.seed_location("HQ").await;
    let inactive = app.seed_inactive_location("Closed wing").await;
    let asset = app.seed_equipment("EQ-100", Some(hq.id), None, None).await;

    // Target equals current location.
    let err = app
        .state
        .services
        .movements
        .request_movement(request_command(asset.id, hq.id, "alice", &[]))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTarget(_));

    // Inactive target location.
    let err = app
        .state
        .services
        .movements
        .request_movement(request_command(asset.id, inactive.id, "alice", &[]))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTarget(_));

    // Unknown target location.
    let err = app
        .state
        .services
        .movements
        .request_movement(request_command(asset.id, Uuid::new_v4(), "alice", &[]))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    // Unknown equipment.
    let err = app
        .state
        .services
        .movements
        .request_movement(request_command(Uuid::new_v4(), hq.id, "alice", &[]))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn soft_deleted_equipment_cannot_be_moved() {
    let app = TestApp::new().await;
    app.seed_user("alice").await;

    let hq = app.seed_location("HQ").await;
    let branch = app.seed_location("Branch-2").await;
    let asset = app.seed_equipment("EQ-100", Some(hq.id), None, None).await;

    app.state
        .services
        .equipment
        .soft_delete(asset.id, "alice")
        .await
        .expect("soft delete should succeed");

    let err = app
        .state
        .services
        .movements
        .request_movement(request_command(asset.id, branch.id, "alice", &[]))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn execute_is_not_idempotent() {
    let app = TestApp::new().await;
    app.seed_user("alice").await;
    app.seed_user("bob").await;

    let hq = app.seed_location("HQ").await;
    let branch = app.seed_location("Branch-2").await;
    let asset = app.seed_equipment("EQ-100", Some(hq.id), None, None).await;

    let movement = app
        .state
        .services
        .movements
        .request_movement(request_command(asset.id, branch.id, "alice", &[]))
        .await
        .unwrap();
    app.state
        .services
        .movements
        .authorize_movement(AuthorizeMovementCommand {
            movement_id: movement.id,
            approve: true,
            note: None,
            authorized_by: "bob".into(),
        })
        .await
        .unwrap();

    app.state
        .services
        .movements
        .execute_movement(ExecuteMovementCommand {
            movement_id: movement.id,
            executed_by: "bob".into(),
        })
        .await
        .expect("first execute should succeed");

    let err = app
        .state
        .services
        .movements
        .execute_movement(ExecuteMovementCommand {
            movement_id: movement.id,
            executed_by: "bob".into(),
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));

    // Asset was mutated exactly once.
    assert_eq!(app.reload_equipment(asset.id).await.location_id, Some(branch.id));
}

#[tokio::test]
async fn rejection_is_terminal_and_skips_approved() {
    let app = TestApp::new().await;
    app.seed_user("alice").await;
    app.seed_user("bob").await;

    let hq = app.seed_location("HQ").await;
    let branch = app.seed_location("Branch-2").await;
    let asset = app.seed_equipment("EQ-100", Some(hq.id), None, None).await;

    let movement = app
        .state
        .services
        .movements
        .request_movement(request_command(asset.id, branch.id, "alice", &[]))
        .await
        .unwrap();

    let rejected = app
        .state
        .services
        .movements
        .authorize_movement(AuthorizeMovementCommand {
            movement_id: movement.id,
            approve: false,
            note: Some("asset is reserved".into()),
            authorized_by: "bob".into(),
        })
        .await
        .expect("reject should succeed");
    assert_eq!(rejected.status, MovementStatus::Rejected);

    // Neither executing nor re-deciding a rejected movement is legal.
    let err = app
        .state
        .services
        .movements
        .execute_movement(ExecuteMovementCommand {
            movement_id: movement.id,
            executed_by: "bob".into(),
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));

    let err = app
        .state
        .services
        .movements
        .authorize_movement(AuthorizeMovementCommand {
            movement_id: movement.id,
            approve: true,
            note: None,
            authorized_by: "bob".into(),
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));

    assert_eq!(app.reload_equipment(asset.id).await.location_id, Some(hq.id));
}

#[tokio::test]
async fn cancel_never_mutates_equipment() {
    let app = TestApp::new().await;
    app.seed_user("alice").await;
    app.seed_user("bob").await;

    let hq = app.seed_location("HQ").await;
    let branch = app.seed_location("Branch-2").await;
    let asset = app.seed_equipment("EQ-100", Some(hq.id), None, None).await;

    // Cancel from pending.
    let movement = app
        .state
        .services
        .movements
        .request_movement(request_command(asset.id, branch.id, "alice", &[]))
        .await
        .unwrap();
    let cancelled = app
        .state
        .services
        .movements
        .cancel_movement(CancelMovementCommand {
            movement_id: movement.id,
            note: None,
            cancelled_by: "alice".into(),
        })
        .await
        .expect("cancel from pending should succeed");
    assert_eq!(cancelled.status, MovementStatus::Cancelled);
    assert_eq!(app.reload_equipment(asset.id).await.location_id, Some(hq.id));

    // Cancel from approved: still no asset mutation.
    let movement = app
        .state
        .services
        .movements
        .request_movement(request_command(asset.id, branch.id, "alice", &[]))
        .await
        .unwrap();
    app.state
        .services
        .movements
        .authorize_movement(AuthorizeMovementCommand {
            movement_id: movement.id,
            approve: true,
            note: None,
            authorized_by: "bob".into(),
        })
        .await
        .unwrap();
    let cancelled = app
        .state
        .services
        .movements
        .cancel_movement(CancelMovementCommand {
            movement_id: movement.id,
            note: Some("changed plans".into()),
            cancelled_by: "bob".into(),
        })
        .await
        .expect("cancel from approved should succeed");
    assert_eq!(cancelled.status, MovementStatus::Cancelled);
    assert_eq!(app.reload_equipment(asset.id).await.location_id, Some(hq.id));

    // Cancelling a terminal movement fails.
    let err = app
        .state
        .services
        .movements
        .cancel_movement(CancelMovementCommand {
            movement_id: movement.id,
            note: None,
            cancelled_by: "bob".into(),
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));
}

#[tokio::test]
async fn first_execute_wins_and_the_loser_fails_with_stale_origin() {
    let app = TestApp::new().await;
    app.seed_user("alice").await;
    app.seed_user("bob").await;

    let hq = app.seed_location("HQ").await;
    let branch_b = app.seed_location("Branch-B").await;
    let branch_c = app.seed_location("Branch-C").await;
    let asset = app.seed_equipment("EQ-100", Some(hq.id), None, None).await;

    // Two competing movements for the same asset, both approved.
    let first = app
        .state
        .services
        .movements
        .request_movement(request_command(asset.id, branch_b.id, "alice", &[]))
        .await
        .unwrap();
    let second = app
        .state
        .services
        .movements
        .request_movement(request_command(asset.id, branch_c.id, "bob", &[]))
        .await
        .unwrap();
    for movement_id in [first.id, second.id] {
        app.state
            .services
            .movements
            .authorize_movement(AuthorizeMovementCommand {
                movement_id,
                approve: true,
                note: None,
                authorized_by: "bob".into(),
            })
            .await
            .unwrap();
    }

    // The first commit wins.
    let winner = app
        .state
        .services
        .movements
        .execute_movement(ExecuteMovementCommand {
            movement_id: first.id,
            executed_by: "bob".into(),
        })
        .await
        .expect("first execute should succeed");
    assert_eq!(winner.status, MovementStatus::Completed);

    // The loser's origin snapshot no longer matches the live asset row.
    let err = app
        .state
        .services
        .movements
        .execute_movement(ExecuteMovementCommand {
            movement_id: second.id,
            executed_by: "bob".into(),
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::StaleOrigin(id) if id == second.id);

    // Exactly one movement completed; the asset sits at the winner's target.
    let loser = app
        .state
        .services
        .movements
        .get_movement(&second.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loser.status, MovementStatus::Approved);
    assert_eq!(app.reload_equipment(asset.id).await.location_id, Some(branch_b.id));
}

#[tokio::test]
async fn moving_an_unplaced_asset_snapshots_a_null_origin() {
    let app = TestApp::new().await;
    app.seed_user("alice").await;

    let branch = app.seed_location("Branch-2").await;
    let asset = app.seed_equipment("EQ-100", None, None, Some("laptop")).await;
    app.seed_category_policy("laptop", false).await;

    let movement = app
        .state
        .services
        .movements
        .request_movement(request_command(asset.id, branch.id, "alice", &[]))
        .await
        .expect("request should succeed");

    assert_eq!(movement.status, MovementStatus::Completed);
    assert_eq!(movement.origin_location_id, None);
    assert_eq!(app.reload_equipment(asset.id).await.location_id, Some(branch.id));
}

#[tokio::test]
async fn audit_trail_only_grows() {
    let app = TestApp::new().await;
    app.seed_user("alice").await;
    app.seed_user("bob").await;

    let hq = app.seed_location("HQ").await;
    let branch = app.seed_location("Branch-2").await;
    let asset = app.seed_equipment("EQ-100", Some(hq.id), None, None).await;

    let mut last_total = 0;
    let movement = app
        .state
        .services
        .movements
        .request_movement(request_command(asset.id, branch.id, "alice", &[]))
        .await
        .unwrap();

    for step in 0..3 {
        match step {
            0 => {}
            1 => {
                app.state
                    .services
                    .movements
                    .authorize_movement(AuthorizeMovementCommand {
                        movement_id: movement.id,
                        approve: true,
                        note: None,
                        authorized_by: "bob".into(),
                    })
                    .await
                    .unwrap();
            }
            _ => {
                app.state
                    .services
                    .movements
                    .execute_movement(ExecuteMovementCommand {
                        movement_id: movement.id,
                        executed_by: "bob".into(),
                    })
                    .await
                    .unwrap();
            }
        }

        let (_, total) = app.state.services.audit.history(asset.id, 1, 50).await.unwrap();
        assert!(total > last_total || step == 0 && total >= 1);
        last_total = total;
    }

    assert!(last_total >= 3);
}

#[tokio::test]
async fn current_location_always_tracks_latest_completed_movement() {
    let app = TestApp::new().await;
    app.seed_user("alice").await;
    app.seed_user("bob").await;

    let hq = app.seed_location("HQ").await;
    let branch_b = app.seed_location("Branch-B").await;
    let branch_c = app.seed_location("Branch-C").await;
    let asset = app.seed_equipment("EQ-100", Some(hq.id), None, Some("laptop")).await;
    app.seed_category_policy("laptop", false).await;

    for target in [branch_b.id, branch_c.id] {
        let movement = app
            .state
            .services
            .movements
            .request_movement(request_command(asset.id, target, "alice", &[]))
            .await
            .unwrap();
        assert_eq!(movement.status, MovementStatus::Completed);
        assert_eq!(app.reload_equipment(asset.id).await.location_id, Some(target));
    }

    let history = app
        .state
        .services
        .movements
        .movements_for_equipment(asset.id)
        .await
        .unwrap();
    let latest_completed = history
        .iter()
        .filter(|m| m.status == MovementStatus::Completed)
        .max_by_key(|m| m.executed_at)
        .unwrap();
    assert_eq!(
        app.reload_equipment(asset.id).await.location_id,
        Some(latest_completed.target_location_id)
    );
}
