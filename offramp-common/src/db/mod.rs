//! Database access layer shared across offramp crates

mod init;

pub use init::{connect_memory, create_schema, init_database, seed_demo_data};
pub use init::{DEMO_SESSION_TOKEN, DEMO_SUBSCRIPTION_ID, DEMO_USER_ID};
