//! Shared test utilities for the landsat-stac workspace.
//!
//! This crate provides common testing infrastructure including:
//! - MTL and ANG text fixtures
//! - Scene list rows and gzip scene list files
//! - Approximate float assertions for footprint coordinates
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{MtlFixture, temp_scene_list};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f64, 1.0_f64, 0.001_f64);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Macro for approximate equality of `[lon, lat]` rings.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_ring_approx_eq;
///
/// assert_ring_approx_eq!(ring, [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0], [0.0, 1.0]], 1e-9);
/// ```
#[macro_export]
macro_rules! assert_ring_approx_eq {
    ($ring:expr, $expected:expr, $epsilon:expr) => {{
        let ring = &$ring;
        let expected = &$expected;
        assert_eq!(ring.len(), expected.len(), "ring length");
        for (got, want) in ring.iter().zip(expected.iter()) {
            $crate::assert_approx_eq!(got[0], want[0], $epsilon);
            $crate::assert_approx_eq!(got[1], want[1], $epsilon);
        }
    }};
}
