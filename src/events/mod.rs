use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Movement events
    MovementRequested(Uuid),
    MovementApproved(Uuid),
    MovementRejected(Uuid),
    MovementCancelled(Uuid),
    MovementExecuted {
        movement_id: Uuid,
        equipment_id: Uuid,
        target_location_id: Uuid,
    },

    // Equipment events
    EquipmentRegistered(Uuid),
    EquipmentUpdated(Uuid),
    EquipmentRetired(Uuid),
    EquipmentStatusChanged {
        equipment_id: Uuid,
        old_status: String,
        new_status: String,
    },

    // Location events
    LocationCreated(Uuid),
    LocationDeactivated(Uuid),

    // Maintenance events
    MaintenanceOpened {
        maintenance_id: Uuid,
        equipment_id: Uuid,
    },
    MaintenanceCompleted {
        maintenance_id: Uuid,
        equipment_id: Uuid,
    },

    // Policy events
    MovementPolicyCreated(Uuid),
}

/// Consumes domain events off the channel. Today every event is logged;
/// notification fan-out would hang off this loop.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::MovementExecuted {
                movement_id,
                equipment_id,
                target_location_id,
            } => {
                info!(
                    movement_id = %movement_id,
                    equipment_id = %equipment_id,
                    target_location_id = %target_location_id,
                    "Movement executed"
                );
            }
            Event::EquipmentStatusChanged {
                equipment_id,
                old_status,
                new_status,
            } => {
                info!(
                    equipment_id = %equipment_id,
                    old_status = %old_status,
                    new_status = %new_status,
                    "Equipment status changed"
                );
            }
            other => info!("Received event: {:?}", other),
        }
    }

    info!("Event processing loop stopped");
}
