//! Test Insights core library.
//!
//! This library provides the two computation engines behind the test
//! regression dashboard: clustering of failed-test error messages into
//! root-cause groups, and reconciliation of git-sourced test metadata
//! against the persisted metadata store.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod repo;
pub mod services;
