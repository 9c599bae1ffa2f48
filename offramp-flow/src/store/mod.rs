//! Persistence layer for drafts and subscriptions
//!
//! All writes that race (first-draft creation, the commit transition) are
//! conditional at the SQL level; nothing here relies on read-then-write.

pub mod drafts;
pub mod subscriptions;
