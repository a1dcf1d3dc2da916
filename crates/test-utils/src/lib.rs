//! Fixtures, a scripted upstream server and float assertions for the
//! workspace's tests.

pub mod fixtures;
pub mod stub_server;

pub use fixtures::*;
pub use stub_server::{StubResponse, StubServer};

/// Assert two numbers differ by at most `tolerance`, comparing as `f64`.
#[macro_export]
macro_rules! assert_approx_eq {
    ($actual:expr, $expected:expr, $tolerance:expr) => {{
        let (actual, expected) = ($actual as f64, $expected as f64);
        let tolerance = $tolerance as f64;
        assert!(
            (actual - expected).abs() <= tolerance,
            "values not within {}: actual {}, expected {}",
            tolerance,
            actual,
            expected
        );
    }};
}
