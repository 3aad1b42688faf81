pub mod common;
pub mod equipment;
pub mod locations;
pub mod maintenance;
pub mod movements;
pub mod policies;

use crate::db::DbPool;
use crate::events::EventSender;
use slog::Logger;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub movements: Arc<crate::services::movements::MovementService>,
    pub policies: Arc<crate::services::policies::MovementPolicyService>,
    pub equipment: Arc<crate::services::equipment::EquipmentService>,
    pub locations: Arc<crate::services::locations::LocationService>,
    pub maintenance: Arc<crate::services::maintenance::MaintenanceService>,
    pub audit: Arc<crate::services::audit::AuditLogService>,
    pub authorization: Arc<crate::services::authorization::AuthorizationService>,
}

impl AppServices {
    /// Builds the service container shared by the HTTP layer.
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, base_logger: Logger) -> Self {
        let movements_logger = base_logger.new(slog::o!("component" => "movement_service"));

        let movements = Arc::new(crate::services::movements::MovementService::new(
            db_pool.clone(),
            event_sender.clone(),
            movements_logger,
        ));
        let policies = Arc::new(crate::services::policies::MovementPolicyService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let equipment = Arc::new(crate::services::equipment::EquipmentService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let locations = Arc::new(crate::services::locations::LocationService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let maintenance = Arc::new(crate::services::maintenance::MaintenanceService::new(
            db_pool.clone(),
            event_sender,
        ));
        let audit = Arc::new(crate::services::audit::AuditLogService::new(db_pool.clone()));
        let authorization = Arc::new(crate::services::authorization::AuthorizationService::new(
            db_pool,
        ));

        Self {
            movements,
            policies,
            equipment,
            locations,
            maintenance,
            audit,
            authorization,
        }
    }
}
