//! API response types

use serde::{Deserialize, Serialize};

/// Response for GET /health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,

    /// Scheduled query jobs
    pub jobs: usize,

    /// Databases that passed their last health check
    pub databases_up: usize,

    /// Databases that failed their last health check
    pub databases_down: usize,
}
