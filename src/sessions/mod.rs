//! Study sessions: records and the list synchronizer

pub mod models;
pub mod sync;

pub use models::{NewStudySession, Participation, SessionRow, StudySession};
pub use sync::{LoadTicket, SessionListCache, SessionSynchronizer, Subscription};
