//! Shared helpers for the integration test targets.

#![allow(dead_code)]
