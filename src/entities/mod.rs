pub mod equipment;
pub mod equipment_audit_log;
pub mod equipment_maintenance;
pub mod equipment_movement;
pub mod group;
pub mod group_membership;
pub mod location;
pub mod movement_policy;
pub mod user;

pub use equipment::EquipmentStatus;
pub use equipment_audit_log::AuditEvent;
pub use equipment_maintenance::MaintenanceType;
pub use equipment_movement::MovementStatus;
pub use location::LocationType;
pub use movement_policy::PolicyScope;
