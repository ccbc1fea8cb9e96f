use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of `GET /ping`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PingRes {
    /// Always `Healthy` while the process can serve requests.
    pub status: String,
}

/// Health check shared by the runtime binaries.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    pub const HEALTHY: &'static str = "Healthy";

    /// Creates a new instance of HealthService.
    pub fn new() -> Self {
        Self
    }

    /// Returns the health status of the runtime.
    ///
    /// # Returns
    /// A `PingRes` with status `Healthy`.
    pub fn check_health() -> PingRes {
        PingRes {
            status: Self::HEALTHY.into(),
        }
    }
}
