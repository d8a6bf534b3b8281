//! Relocate package-manager caches onto another volume and verify that the
//! relocation took effect.
//!
//! The engine runs detection, migration and verification over a [`Catalog`]
//! of descriptors; everything it learns is returned as data and rendered by a
//! [`report::Presenter`].

pub mod catalog;
pub mod cli;
pub mod commands;
pub mod common;
pub mod config;
pub mod detect;
pub mod env;
pub mod error;
pub mod migrate;
pub mod mover;
pub mod privileges;
pub mod prompt;
pub mod report;
pub mod ui;
pub mod verify;
pub mod volume;

pub use catalog::{CacheDescriptor, Catalog, DescriptorSpec};
pub use error::{EngineError, Stage, StageFailure};
