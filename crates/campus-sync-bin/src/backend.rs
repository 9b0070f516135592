//! Gateway and change stream selection.

use campus_config_and_utils::Config;
use change_stream::{ChangeStream, MemoryChangeHub, RealtimeClient, RealtimeConfig};
use std::sync::Arc;
use table_gateway::{MemoryGateway, SupabaseGateway, TableGateway, TableSchema};
use tracing::info;

/// The two halves every store needs.
pub struct Backend {
    pub gateway: Arc<dyn TableGateway>,
    pub stream: Arc<dyn ChangeStream>,
}

impl Backend {
    pub fn connect(config: &Config, offline: bool) -> Result<Self, Box<dyn std::error::Error>> {
        if offline {
            info!("Using in-process tables");
            return Ok(Self::offline());
        }

        info!(url = %config.supabase_url, "Using Supabase");
        Ok(Self {
            gateway: Arc::new(SupabaseGateway::from_config(config)?),
            stream: Arc::new(RealtimeClient::new(RealtimeConfig::from_config(config))),
        })
    }

    /// Memory tables with the same keys and constraints as the hosted schema.
    pub fn offline() -> Self {
        let hub = MemoryChangeHub::new();
        let gateway = MemoryGateway::with_hub(hub.clone());

        gateway.define_table(
            "courses",
            TableSchema::new().required(&["name", "program", "type", "faculty"]),
        );
        gateway.define_table(
            "faculty",
            TableSchema::new()
                .auto_keyed()
                .required(&["faculty_id", "name", "email", "department", "designation"])
                .unique(&["faculty_id", "email"]),
        );
        gateway.define_table(
            "students",
            TableSchema::new()
                .auto_keyed()
                .required(&["student_id", "name", "email", "program", "batch"])
                .unique(&["student_id", "email"]),
        );
        gateway.define_table(
            "rooms",
            TableSchema::new()
                .auto_keyed()
                .required(&["room_number", "name", "type"])
                .unique(&["room_number"]),
        );

        Self {
            gateway: Arc::new(gateway),
            stream: Arc::new(hub),
        }
    }
}
