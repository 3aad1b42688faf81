pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_locations_table;
mod m20250301_000002_create_identity_tables;
mod m20250301_000003_create_equipment_table;
mod m20250301_000004_create_equipment_movements_table;
mod m20250301_000005_create_movement_policies_table;
mod m20250301_000006_create_equipment_audit_log_table;
mod m20250301_000007_create_equipment_maintenance_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_locations_table::Migration),
            Box::new(m20250301_000002_create_identity_tables::Migration),
            Box::new(m20250301_000003_create_equipment_table::Migration),
            Box::new(m20250301_000004_create_equipment_movements_table::Migration),
            Box::new(m20250301_000005_create_movement_policies_table::Migration),
            Box::new(m20250301_000006_create_equipment_audit_log_table::Migration),
            Box::new(m20250301_000007_create_equipment_maintenance_table::Migration),
        ]
    }
}
