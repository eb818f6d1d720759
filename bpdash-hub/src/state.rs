use crate::hub::SyncHub;
use crate::ports::TimelineSource;
use parking_lot::Mutex;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Everything the HTTP and WebSocket handlers reach through Axum state.
#[derive(Clone)]
pub struct AppState {
    pub hub: SyncHub,
    pub timelines: Arc<dyn TimelineSource>,
}
