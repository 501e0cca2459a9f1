//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

pub mod logging;
pub mod session;

pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use session::{SessionFacade, Subscription};
