//! ocibundle CLI - inspect OCI images and bundle metadata.

pub mod commands;
pub mod output;
