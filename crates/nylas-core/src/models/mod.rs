//! Domain models shared across the auth core

mod grant;

pub use grant::{Grant, Provider};
