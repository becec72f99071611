pub mod api;
pub mod config;
pub mod controller;
pub mod entity;
pub mod error;
pub mod models;
pub mod progress;
pub mod tracker;
pub mod utils;
pub mod view;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
