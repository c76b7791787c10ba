//! CLI Commands

pub mod config;
pub mod flows;
pub mod run;
