//! kubectl plugin for editing the `status` sub-resource of any object.

pub mod commands;
pub mod config;
pub mod editor;
pub mod error;
pub mod k8s;
pub mod telemetry;
pub mod yaml;
