pub mod answers;
pub mod bulk;
pub mod config;
pub mod contacts;
pub mod db;
pub mod error;
pub mod qualify;
pub mod scheduling;
pub mod survey;
pub mod transport;

pub use error::{Result, SchedulingError, SurveyError, TransportError};
