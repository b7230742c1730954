use crate::app::ports::{EventStore, SheetSink};
use crate::types::{CinemaChain, EnrichedEvent, EventRow};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Which sinks accepted an event. The two writes are independent, so any
/// combination can happen and none is rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersistStatus {
    Complete,
    SheetOnly,
    DatabaseOnly,
    Failed,
}

/// Result of writing one event to both sinks
#[derive(Debug, Clone)]
pub struct PersistOutcome {
    pub sheet: Result<(), String>,
    pub database: Result<(), String>,
}

impl PersistOutcome {
    pub fn status(&self) -> PersistStatus {
        match (self.sheet.is_ok(), self.database.is_ok()) {
            (true, true) => PersistStatus::Complete,
            (true, false) => PersistStatus::SheetOnly,
            (false, true) => PersistStatus::DatabaseOnly,
            (false, false) => PersistStatus::Failed,
        }
    }
}

/// Spreadsheet plus relational store, written one after the other
pub struct PersistenceSinks {
    sheet: Arc<dyn SheetSink>,
    store: Arc<dyn EventStore>,
    chain: CinemaChain,
}

impl PersistenceSinks {
    pub fn new(sheet: Arc<dyn SheetSink>, store: Arc<dyn EventStore>, chain: CinemaChain) -> Self {
        Self { sheet, store, chain }
    }

    #[instrument(skip(self, event), fields(title = %event.title))]
    pub async fn persist(&self, event: &EnrichedEvent) -> PersistOutcome {
        let sheet = match self.sheet.append_event(event, Utc::now()).await {
            Ok(()) => {
                info!("✅ Sheet row appended");
                Ok(())
            }
            Err(e) => {
                error!("Sheet error: {}", e);
                Err(e.to_string())
            }
        };

        let row = EventRow::from_enriched(event, self.chain);
        let database = match self.store.insert_event(&row).await {
            Ok(()) => {
                info!("✅ Database row inserted");
                Ok(())
            }
            Err(e) => {
                error!("Database error: {}", e);
                Err(e.to_string())
            }
        };

        let outcome = PersistOutcome { sheet, database };
        match outcome.status() {
            PersistStatus::Complete => {}
            PersistStatus::Failed => warn!("Event was not persisted to either sink"),
            partial => warn!("Partial persistence: {:?}", partial),
        }
        outcome
    }
}
