mod accounts;
mod actions;
mod audit;
mod common;
mod resources;

pub use accounts::{
    AccountVerificationResponse, ProviderAccountResponse, SaveProviderAccountRequest,
};
pub use actions::{ActionOutcomeResponse, PerformActionRequest, TargetResultResponse};
pub use audit::{AuditEntryPageResponse, AuditEntryResponse, AuditQuery};
pub use common::{HealthDependencyStatus, HealthResponse};
pub use resources::{
    ProviderFailureResponse, ResourceDependencyResponse, ResourceListQuery, ResourcePageResponse,
    ResourceResponse,
};
