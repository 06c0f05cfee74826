//! Test helper modules for vseq-player integration tests
//!
//! - ManualBackend: media backend driven by the test, with handle accounting
//! - Fixture: player context wired to an in-memory asset store

#![allow(dead_code)]

pub mod fixture;
pub mod manual_backend;

pub use fixture::{drain_events, eventually, segments, settle, uri, wait_for, Fixture};
pub use manual_backend::ManualBackend;
