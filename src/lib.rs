pub mod abi;
pub mod action;
pub mod activity;
pub mod app;
pub mod chain;
pub mod config;
pub mod decoder;
pub mod eligibility;
pub mod error;
pub mod format;
pub mod poller;
pub mod provider;
pub mod session;
pub mod ui;

pub mod test_helpers;
