//! Document store backends

pub mod data_api;
pub mod mongodb;
