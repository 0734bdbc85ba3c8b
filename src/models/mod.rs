// src/models/mod.rs

pub mod answer;
pub mod question;
pub mod result;
pub mod snapshot;
pub mod test;
