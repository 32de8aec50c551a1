use crate::pb::HealthRes;

/// Health check shared by the gRPC and REST APIs.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    pub fn new() -> Self {
        Self
    }

    /// # Returns
    /// A `HealthRes` indicating the service is healthy.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "Alinea is alive".into(),
        }
    }
}
