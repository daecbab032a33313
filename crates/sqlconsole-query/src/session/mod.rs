//! Console sessions
//!
//! A session binds one reserved connection to its attributes, its batch
//! registry and its content store. Sessions expire after a period of
//! inactivity; expiry is permanent.

mod attributes;
mod console_session;
mod registry;

pub use attributes::{
    NLS_DATE_FORMAT, NLS_FORMAT_KEYS, NLS_TIMESTAMP_FORMAT, NLS_TIMESTAMP_TZ_FORMAT, TIME_ZONE,
};
pub use console_session::{Session, SessionError};
pub use registry::{SessionRegistry, SessionSettings};
