//! Single integration-test binary, mirroring the pack's own approach: one
//! binary across every scenario keeps parallelism high and avoids linking a
//! separate test binary per file.
#![expect(
    clippy::tests_outside_test_module,
    reason = "this is the integration test binary; tests live at module top level by convention here"
)]
#![expect(clippy::unwrap_used, reason = "unwrap is fine in test code")]

mod common;
mod double_completion;
mod expiry_sweep;
mod happy_path;
mod oidc_error;
mod role_denial;
mod short_url_bound;
mod username_mismatch;
