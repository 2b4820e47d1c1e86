//! Occupancy and usage counters.

use axum::{Json, extract::State};
use ferrite_cache::CacheStats;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct StatsResponse {
    pub cache: CacheStats,
    pub memory: MemoryStats,
}

#[derive(Serialize)]
pub struct MemoryStats {
    pub used_bytes: u64,
    pub max_bytes: u64,
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        cache: state.cache.stats(),
        memory: MemoryStats {
            used_bytes: state.budget.used_bytes(),
            max_bytes: state.budget.max_bytes(),
        },
    })
}
