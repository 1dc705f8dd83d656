/// Re-export `Config` from `pagetrail-core` for use within this crate.
///
/// All environment-variable parsing lives in `pagetrail-core` so it can be
/// shared by the server, the rollup binary and integration tests.
pub use pagetrail_core::config::Config;
