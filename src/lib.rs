// src/lib.rs
#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

pub mod error;
pub mod util;
pub mod config;

pub mod hasher;
pub mod walker;
pub mod store;
pub mod diff;
pub mod index;

pub mod commands;

pub use config::IndexConfig;
pub use error::{IndexError, Result};
pub use index::{ContentIndex, IndexState, IndexStats, Location, RefreshOutcome, RefreshReport};
