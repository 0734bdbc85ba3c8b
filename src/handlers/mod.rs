// src/handlers/mod.rs

pub mod catalog;
pub mod results;
pub mod session;
