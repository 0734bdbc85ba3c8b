// src/runtime/mod.rs
//
// Async side of sessions: one driver task per live session plus the registry
// the HTTP layer looks them up in.

pub mod driver;
pub mod registry;

pub use driver::{DriverSettings, SessionHandle, SessionInput};
pub use registry::SessionRegistry;
