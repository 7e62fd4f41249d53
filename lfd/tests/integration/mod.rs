//! Integration tests for the lfd-* crates.
//!
//! These tests verify end-to-end behavior across crate boundaries:
//! - registration warp → contact-following transfer for every strategy
//! - bimanual demonstrations and fixed-start trajectories
//! - greedy and beam-search selection driving real transfer strategies

pub mod selection;
pub mod strategies;
