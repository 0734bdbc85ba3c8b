// src/engine/mod.rs
//
// Synchronous session core. Nothing in here awaits: storage writes that can
// block go through the runtime driver.

pub mod answers;
pub mod comparison;
pub mod review;
pub mod scoring;
pub mod session;
pub mod snapshot;
pub mod timer;
