// src/lib.rs
// Library interface for ct-inventory
pub mod cli;
pub mod config;
pub mod controller;
pub mod database;
pub mod error;
pub mod normalizer;
pub mod notifier;
pub mod output;
pub mod reconciler;
pub mod selector;
pub mod source;
pub mod stats;
pub mod summary;
pub mod types;
