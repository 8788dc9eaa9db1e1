//! Service layer
//!
//! Services own the session and drive the API client. Each one covers a
//! single feature area.

pub mod auth;
pub mod dashboard;
pub mod links;
pub mod logging;
pub mod queries;
pub mod query;
pub mod redirect;
mod session;

pub use auth::{AuthOutcome, AuthService};
pub use dashboard::{DashboardService, DashboardSummary, DashboardView};
pub use links::LinkService;
pub use logging::{EntryPoint, EventCount, LogEntry, LogEvent, LoggingService};
pub use queries::{LinkAnalyticsQuery, MyLinksQuery, TotalClicksQuery};
pub use query::{Query, QueryCache, QueryKey, QuerySpec, QueryState};
pub use redirect::RedirectService;
pub use session::Session;
