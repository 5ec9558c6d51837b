//! Device-independent model of a mug: what it can do and what we last saw.

pub mod attributes;
pub mod capabilities;
pub mod models;
pub mod settings;
pub mod state;
