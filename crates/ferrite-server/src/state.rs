//! Application state shared across handlers.

use std::sync::Arc;

use ferrite_cache::ObjectStoreCache;
use ferrite_core::MemoryBudget;
use ferrite_qos::QosController;

/// Shared state: the cache, the QoS controller, and the transfer-buffer
/// memory budget.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ObjectStoreCache>,
    pub qos: Arc<QosController>,
    pub budget: Arc<MemoryBudget>,
}
