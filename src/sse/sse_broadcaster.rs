use crate::sse::models::TastingEvent;
use tokio::sync::broadcast;

pub fn create_event_broadcaster() -> broadcast::Sender<TastingEvent> {
    let (tx, _rx) = broadcast::channel(100);
    tx
}
