//! Request interceptors for the attestation client
//!
//! Interceptors are registered on one client instance; nothing global is
//! patched.

use std::time::Duration;

use crate::common::logging::{generate_correlation_id, log_network_call};

/// One outgoing call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    pub method: String,
    pub url: String,
    pub correlation_id: String,
}

impl RequestInfo {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            correlation_id: generate_correlation_id(),
        }
    }
}

/// Observes calls made by an `AttestationClient`
pub trait Interceptor: Send + Sync {
    fn before_request(&self, _request: &RequestInfo) {}

    /// `status` is `None` when the call failed before a response arrived
    fn after_response(&self, request: &RequestInfo, status: Option<u16>, elapsed: Duration);
}

/// Logs every call through the structured logger
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingInterceptor;

impl Interceptor for TracingInterceptor {
    fn before_request(&self, request: &RequestInfo) {
        tracing::trace!(
            target: "xbridge::network",
            method = %request.method,
            url = %request.url,
            correlation_id = %request.correlation_id,
            "request"
        );
    }

    fn after_response(&self, request: &RequestInfo, status: Option<u16>, elapsed: Duration) {
        log_network_call(
            &request.method,
            &request.url,
            status,
            elapsed.as_millis() as u64,
            &request.correlation_id,
        );
    }
}
