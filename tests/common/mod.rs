#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use assettrack_api::{
    config::AppConfig,
    db,
    entities::{
        equipment::{self, CriticalityTier, EquipmentStatus},
        group, group_membership,
        location::{self, LocationType},
        movement_policy::{self, PolicyScope},
        user,
    },
    events::{self, EventSender},
    handlers::AppServices,
    logging,
    services::authorization::SYSTEM_ADMINISTRATOR_GROUP,
    AppState,
};

/// Helper harness for spinning up an application state backed by a
/// temporary SQLite database.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_dir = TempDir::new().expect("create temp dir for test database");
        let db_path = db_dir.path().join("assettrack_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            logging::discard_logger(),
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = assettrack_api::app_router().with_state(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    pub async fn seed_user(&self, id: &str) -> user::Model {
        user::ActiveModel {
            id: Set(id.to_string()),
            username: Set(id.to_string()),
            name: Set(Some(format!("User {}", id))),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed user")
    }

    pub async fn seed_group(&self, id: &str, name: &str) -> group::Model {
        group::ActiveModel {
            id: Set(id.to_string()),
            name: Set(name.to_string()),
            description: Set(None),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed group")
    }

    pub async fn seed_membership(&self, group_id: &str, user_id: &str, is_admin: bool) {
        group_membership::ActiveModel {
            group_id: Set(group_id.to_string()),
            user_id: Set(user_id.to_string()),
            is_admin: Set(is_admin),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed membership");
    }

    /// Creates the distinguished administrators group (if missing) and makes
    /// `user_id` one of its admins, i.e. a global admin.
    pub async fn seed_global_admin(&self, user_id: &str) {
        use sea_orm::EntityTrait;

        let existing = group::Entity::find_by_id("sys-admin".to_string())
            .one(&*self.state.db)
            .await
            .expect("lookup administrators group");
        if existing.is_none() {
            self.seed_group("sys-admin", SYSTEM_ADMINISTRATOR_GROUP).await;
        }
        self.seed_membership("sys-admin", user_id, true).await;
    }

    pub async fn seed_location(&self, name: &str) -> location::Model {
        let now = Utc::now();
        location::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            location_type: Set(LocationType::Room),
            parent_id: Set(None),
            timezone: Set(None),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed location")
    }

    pub async fn seed_inactive_location(&self, name: &str) -> location::Model {
        let seeded = self.seed_location(name).await;
        let mut active: location::ActiveModel = seeded.into();
        active.is_active = Set(false);
        active.update(&*self.state.db).await.expect("deactivate location")
    }

    pub async fn seed_equipment(
        &self,
        asset_code: &str,
        location_id: Option<Uuid>,
        owning_group_id: Option<&str>,
        category: Option<&str>,
    ) -> equipment::Model {
        let now = Utc::now();
        equipment::ActiveModel {
            id: Set(Uuid::new_v4()),
            asset_code: Set(asset_code.to_string()),
            name: Set(format!("Asset {}", asset_code)),
            description: Set(None),
            category: Set(category.map(str::to_string)),
            criticality: Set(CriticalityTier::Medium),
            status: Set(EquipmentStatus::Active),
            location_id: Set(location_id),
            custodian_user_id: Set(None),
            owning_group_id: Set(owning_group_id.map(str::to_string)),
            acquisition_date: Set(None),
            metadata: Set(None),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed equipment")
    }

    pub async fn seed_category_policy(
        &self,
        category: &str,
        requires_approval: bool,
    ) -> movement_policy::Model {
        let now = Utc::now();
        movement_policy::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(format!("category:{}", category)),
            scope: Set(PolicyScope::Category),
            role: Set(None),
            location_id: Set(None),
            category: Set(Some(category.to_string())),
            requires_approval: Set(requires_approval),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed policy")
    }

    pub async fn seed_role_policy(
        &self,
        role: &str,
        requires_approval: bool,
    ) -> movement_policy::Model {
        let now = Utc::now();
        movement_policy::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(format!("role:{}", role)),
            scope: Set(PolicyScope::Role),
            role: Set(Some(role.to_string())),
            location_id: Set(None),
            category: Set(None),
            requires_approval: Set(requires_approval),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed policy")
    }

    /// Reloads an equipment row straight from the database.
    pub async fn reload_equipment(&self, id: Uuid) -> equipment::Model {
        use sea_orm::EntityTrait;

        equipment::Entity::find_by_id(id)
            .one(&*self.state.db)
            .await
            .expect("reload equipment")
            .expect("equipment row should exist")
    }

    /// Send a request against the router, optionally acting as a user.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
        acting_user: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(user) = acting_user {
            builder = builder.header("x-user-id", user);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

/// Reads a response body as JSON.
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}
