use std::sync::Arc;
use tokio::task::JoinError;

use loket_core::{
    audit::{AuditHandle, AuditStore},
    qr::QrEncoder,
    Authenticator, Config, QueueBoard, QueueSequencer, SanitizedConfig, SchedulingPolicy,
    TicketLifecycle, TicketStore,
};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    audit_store: Arc<dyn AuditStore>,
    ticket_store: Arc<dyn TicketStore>,
    sequencer: QueueSequencer,
    lifecycle: TicketLifecycle,
    board: QueueBoard,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        audit: AuditHandle,
        audit_store: Arc<dyn AuditStore>,
        ticket_store: Arc<dyn TicketStore>,
        qr_encoder: Option<Arc<dyn QrEncoder>>,
    ) -> Self {
        let policy = Arc::new(SchedulingPolicy::from_config(&config.queue));

        let mut sequencer = QueueSequencer::new(Arc::clone(&ticket_store), Arc::clone(&policy))
            .with_audit(audit.clone());
        if let Some(qr) = qr_encoder {
            sequencer = sequencer.with_qr_encoder(qr);
        }
        let lifecycle = TicketLifecycle::new(Arc::clone(&ticket_store), Arc::clone(&policy))
            .with_audit(audit);
        let board = QueueBoard::new(Arc::clone(&ticket_store), policy);

        Self {
            config,
            authenticator,
            audit_store,
            ticket_store,
            sequencer,
            lifecycle,
            board,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.audit_store.as_ref()
    }

    pub fn ticket_store(&self) -> &dyn TicketStore {
        self.ticket_store.as_ref()
    }

    pub fn sequencer(&self) -> &QueueSequencer {
        &self.sequencer
    }

    pub fn lifecycle(&self) -> &TicketLifecycle {
        &self.lifecycle
    }

    pub fn board(&self) -> &QueueBoard {
        &self.board
    }
}

/// Run synchronous store work on the blocking thread pool.
///
/// SQLite writes may wait up to the configured busy timeout for the database
/// lock.
pub async fn run_blocking<T, F>(state: &Arc<AppState>, work: F) -> Result<T, JoinError>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> T + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || work(&state)).await
}
