pub mod api;
pub mod args;
pub mod config;
pub mod errors;
pub mod image;
pub mod mail;
pub mod pipeline;
pub mod policy;
pub mod render;
pub mod report;
pub mod vulns;
