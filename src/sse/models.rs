use uuid::Uuid;

/// Broadcast whenever something that changes a tasting's results happens.
/// Streams filter on the tasting id they watch.
#[derive(Debug, Clone)]
pub enum TastingEvent {
    ResponseSaved { tasting_id: Uuid },
    NamesUpdated { tasting_id: Uuid },
    TastingClosed(Uuid),
}

pub type EventSender = tokio::sync::broadcast::Sender<TastingEvent>;
