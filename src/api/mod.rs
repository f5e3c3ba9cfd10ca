mod handlers;
mod routes;
mod tenant;

pub use handlers::{DeliveryStatusResponse, DeliverySummary, ListParams, QueuedResponse};
pub use routes::api_routes;
pub use tenant::{TenantId, TENANT_HEADER};
