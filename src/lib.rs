pub mod config;
pub mod error;
pub mod exam;
pub mod report;
pub mod rubric;
pub mod scheduler;
pub mod seed;
pub mod session;
pub mod shutdown;
pub mod worker;

pub use error::{MarkingError, Result};
pub use session::MarkingSession;
