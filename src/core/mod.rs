//! Core types shared by the trace relay and the mapping engine.

pub mod types;
