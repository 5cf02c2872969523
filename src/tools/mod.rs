//! Diagnostic tools.
//!
//! A static registry of named checks. Each tool is looked up by the name typed
//! after `/` or requested by the model, runs one check and returns plain text.
//! Multi-target checks share the probe-and-retry discipline in [`probe`].

mod base;
pub mod cloud;
pub mod connectivity;
pub mod dns;
pub mod external_ip;
pub mod infra;
pub mod mail;
pub mod ntp;
pub mod probe;
mod registry;
mod runner;
pub mod speed;
pub mod system;
pub mod web;
pub mod whois;

pub use base::{str_arg, u64_arg, DiagnosticTool, ToolContext, ToolOutput, USER_AGENT};
pub use registry::ToolRegistry;
pub use runner::{describe_ip_change, ToolRun, ToolRunner};
