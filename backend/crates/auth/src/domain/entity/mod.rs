//! Entities

pub mod account_lock;
pub mod login_attempt;
pub mod oauth_account;
pub mod security_event;
pub mod user;
