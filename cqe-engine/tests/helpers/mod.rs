//! Test helper utilities
//!
//! Shared setup for cqe-engine integration tests.
#![allow(dead_code)]

pub mod db_utils;
pub mod log_capture;

pub use db_utils::{fast_config, strong_content, test_engine, weak_content, TestEngine};
pub use log_capture::init_test_logging;
