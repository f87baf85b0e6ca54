//! Trail reporting for structural verification.
//!
//! Verification returns plain booleans; this hook records where a walk first
//! failed. Every level reports on the way back up, so one broken field yields
//! a short trail naming the path down to it.

pub(crate) fn verify_failed(node: &str, detail: &str) {
    tracing::warn!(node, detail, "document verification failed");
}
