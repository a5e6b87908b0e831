//! Value Object Module

pub mod email;
pub mod session_key;
