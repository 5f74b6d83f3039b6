pub mod commands;
pub mod config;
pub mod copier;
pub mod engine;
pub mod error;
pub mod export;
pub mod model;
pub mod output;
pub mod pending;
pub mod signature;
pub mod tracker;
pub mod translate;
pub mod xref;
