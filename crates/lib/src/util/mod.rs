//! Shared utilities.
//!
//! Hashing, plus helpers for tests.

pub mod hash;

#[cfg(test)]
pub mod testutil;
