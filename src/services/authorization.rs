use std::collections::HashSet;
use std::sync::Arc;

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tracing::instrument;

use crate::{
    db::DbPool,
    entities::{equipment, equipment_movement, group, group_membership},
    errors::ServiceError,
};

/// Name of the distinguished group whose admins are global administrators.
/// Resolved by name so business logic never compares raw group ids.
pub const SYSTEM_ADMINISTRATOR_GROUP: &str = "administrators";

/// A user's resolved permission set. Group-scoped admin rights only become
/// global through the administrators group.
#[derive(Debug, Clone, Default)]
pub struct Permissions {
    pub is_global_admin: bool,
    pub admin_group_ids: HashSet<String>,
    pub member_group_ids: HashSet<String>,
}

impl Permissions {
    /// Read-level access: global admins see everything, ungrouped assets are
    /// visible to any authenticated user, grouped assets to their members.
    pub fn can_view_equipment(&self, equipment: &equipment::Model) -> bool {
        if self.is_global_admin {
            return true;
        }
        match &equipment.owning_group_id {
            None => true,
            Some(group_id) => {
                self.member_group_ids.contains(group_id) || self.admin_group_ids.contains(group_id)
            }
        }
    }

    /// Admin-level access to an asset: global admin, or admin of its owning
    /// group. Ungrouped assets are administered by global admins only.
    pub fn can_administer_equipment(&self, equipment: &equipment::Model) -> bool {
        if self.is_global_admin {
            return true;
        }
        match &equipment.owning_group_id {
            None => false,
            Some(group_id) => self.admin_group_ids.contains(group_id),
        }
    }

    /// Authorizing a movement always needs admin-level access, never mere
    /// membership.
    pub fn can_authorize_movement(&self, equipment: &equipment::Model) -> bool {
        self.can_administer_equipment(equipment)
    }

    /// A movement may be cancelled by its requester or an administrator of
    /// the asset.
    pub fn can_cancel_movement(
        &self,
        user_id: &str,
        movement: &equipment_movement::Model,
        equipment: &equipment::Model,
    ) -> bool {
        movement.requested_by_user_id == user_id || self.can_administer_equipment(equipment)
    }
}

/// Resolves effective permissions and policy roles from group memberships.
#[derive(Clone)]
pub struct AuthorizationService {
    db_pool: Arc<DbPool>,
}

impl AuthorizationService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Loads the caller's memberships and folds them into a `Permissions`
    /// value object usable for pure checks.
    #[instrument(skip(self))]
    pub async fn effective_permissions(&self, user_id: &str) -> Result<Permissions, ServiceError> {
        let db = &*self.db_pool;

        let memberships = group_membership::Entity::find()
            .filter(group_membership::Column::UserId.eq(user_id))
            .all(db)
            .await
            .map_err(ServiceError::from)?;

        if memberships.is_empty() {
            return Ok(Permissions::default());
        }

        let group_ids: Vec<String> = memberships.iter().map(|m| m.group_id.clone()).collect();
        let groups = group::Entity::find()
            .filter(group::Column::Id.is_in(group_ids))
            .all(db)
            .await
            .map_err(ServiceError::from)?;

        let mut permissions = Permissions::default();
        for membership in &memberships {
            permissions
                .member_group_ids
                .insert(membership.group_id.clone());
            if membership.is_admin {
                permissions
                    .admin_group_ids
                    .insert(membership.group_id.clone());

                let is_system_group = groups
                    .iter()
                    .any(|g| g.id == membership.group_id && g.name == SYSTEM_ADMINISTRATOR_GROUP);
                if is_system_group {
                    permissions.is_global_admin = true;
                }
            }
        }

        Ok(permissions)
    }

    /// The role names the policy resolver matches against: the names of the
    /// groups the user belongs to.
    #[instrument(skip(self))]
    pub async fn requester_roles(&self, user_id: &str) -> Result<Vec<String>, ServiceError> {
        let db = &*self.db_pool;

        let memberships = group_membership::Entity::find()
            .filter(group_membership::Column::UserId.eq(user_id))
            .all(db)
            .await
            .map_err(ServiceError::from)?;

        if memberships.is_empty() {
            return Ok(Vec::new());
        }

        let group_ids: Vec<String> = memberships.into_iter().map(|m| m.group_id).collect();
        let groups = group::Entity::find()
            .filter(group::Column::Id.is_in(group_ids))
            .all(db)
            .await
            .map_err(ServiceError::from)?;

        Ok(groups.into_iter().map(|g| g.name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::equipment::{CriticalityTier, EquipmentStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn asset(owning_group_id: Option<&str>) -> equipment::Model {
        let now = Utc::now();
        equipment::Model {
            id: Uuid::new_v4(),
            asset_code: "EQ-1".into(),
            name: "Bench supply".into(),
            description: None,
            category: None,
            criticality: CriticalityTier::Low,
            status: EquipmentStatus::Active,
            location_id: None,
            custodian_user_id: None,
            owning_group_id: owning_group_id.map(str::to_string),
            acquisition_date: None,
            metadata: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn perms(global: bool, admin: &[&str], member: &[&str]) -> Permissions {
        Permissions {
            is_global_admin: global,
            admin_group_ids: admin.iter().map(|s| s.to_string()).collect(),
            member_group_ids: member.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn global_admin_can_do_everything() {
        let p = perms(true, &[], &[]);
        let grouped = asset(Some("g1"));
        let ungrouped = asset(None);

        assert!(p.can_view_equipment(&grouped));
        assert!(p.can_administer_equipment(&grouped));
        assert!(p.can_authorize_movement(&ungrouped));
    }

    #[test]
    fn member_sees_but_cannot_authorize() {
        let p = perms(false, &[], &["g1"]);
        let equipment = asset(Some("g1"));

        assert!(p.can_view_equipment(&equipment));
        assert!(!p.can_administer_equipment(&equipment));
        assert!(!p.can_authorize_movement(&equipment));
    }

    #[test]
    fn group_admin_scope_is_limited_to_their_group() {
        let p = perms(false, &["g1"], &["g1"]);

        assert!(p.can_authorize_movement(&asset(Some("g1"))));
        assert!(!p.can_authorize_movement(&asset(Some("g2"))));
        // Ungrouped assets stay global-admin territory.
        assert!(!p.can_administer_equipment(&asset(None)));
    }

    #[test]
    fn ungrouped_assets_are_visible_to_everyone() {
        let p = perms(false, &[], &[]);
        assert!(p.can_view_equipment(&asset(None)));
        assert!(!p.can_view_equipment(&asset(Some("g1"))));
    }

    #[test]
    fn requester_or_admin_may_cancel() {
        let equipment = asset(Some("g1"));
        let now = Utc::now();
        let movement = equipment_movement::Model {
            id: Uuid::new_v4(),
            equipment_id: equipment.id,
            requested_by_user_id: "alice".into(),
            authorized_by_user_id: None,
            origin_location_id: None,
            origin_custodian_user_id: None,
            target_location_id: Uuid::new_v4(),
            target_custodian_user_id: None,
            status: crate::entities::MovementStatus::Pending,
            movement_note: None,
            authorization_note: None,
            requested_at: now,
            authorized_at: None,
            executed_at: None,
            created_at: now,
            updated_at: now,
        };

        let requester = perms(false, &[], &["g1"]);
        assert!(requester.can_cancel_movement("alice", &movement, &equipment));
        assert!(!requester.can_cancel_movement("bob", &movement, &equipment));

        let admin = perms(false, &["g1"], &["g1"]);
        assert!(admin.can_cancel_movement("bob", &movement, &equipment));
    }
}
