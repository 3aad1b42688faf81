use axum::{
    routing::{get, post, put},
    Router,
};

use crate::{handlers, AppState};

/// Versioned API surface. The movement workflow routes map 1:1 to the
/// workflow commands; the rest are directory and audit reads.
pub fn api_v1_routes() -> Router<AppState> {
    let movements = Router::new()
        .route(
            "/movements",
            get(handlers::movements::list_movements).post(handlers::movements::request_movement),
        )
        .route(
            "/movements/pending",
            get(handlers::movements::pending_approvals),
        )
        .route("/movements/:id", get(handlers::movements::get_movement))
        .route(
            "/movements/:id/authorize",
            post(handlers::movements::authorize_movement),
        )
        .route(
            "/movements/:id/execute",
            post(handlers::movements::execute_movement),
        )
        .route(
            "/movements/:id/cancel",
            post(handlers::movements::cancel_movement),
        );

    let equipment = Router::new()
        .route(
            "/equipment",
            get(handlers::equipment::list_equipment).post(handlers::equipment::register_equipment),
        )
        .route(
            "/equipment/:id",
            get(handlers::equipment::get_equipment)
                .put(handlers::equipment::update_equipment)
                .delete(handlers::equipment::delete_equipment),
        )
        .route(
            "/equipment/:id/status",
            put(handlers::equipment::change_equipment_status),
        )
        .route(
            "/equipment/:id/audit-log",
            get(handlers::equipment::equipment_audit_log),
        )
        .route(
            "/equipment/:id/maintenance",
            get(handlers::maintenance::maintenance_history),
        );

    let locations = Router::new()
        .route(
            "/locations",
            get(handlers::locations::list_locations).post(handlers::locations::create_location),
        )
        .route("/locations/:id", get(handlers::locations::get_location))
        .route(
            "/locations/:id/parent",
            put(handlers::locations::set_location_parent),
        )
        .route(
            "/locations/:id/deactivate",
            post(handlers::locations::deactivate_location),
        );

    let policies = Router::new().route(
        "/movement-policies",
        get(handlers::policies::list_policies).post(handlers::policies::create_policy),
    );

    let maintenance = Router::new()
        .route("/maintenance", post(handlers::maintenance::open_maintenance))
        .route(
            "/maintenance/:id/complete",
            post(handlers::maintenance::complete_maintenance),
        );

    Router::new()
        .merge(movements)
        .merge(equipment)
        .merge(locations)
        .merge(policies)
        .merge(maintenance)
}
