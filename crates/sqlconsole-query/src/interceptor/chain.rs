use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use thiserror::Error;

use super::{NlsFormatInterceptor, TimeZoneInterceptor};
use crate::executor::{ExecutionContext, StatementOutcome};
use crate::session::{Session, SessionError};

/// Errors an interceptor may report; they never affect the statement result
#[derive(Debug, Error)]
pub enum InterceptorError {
    #[error("session attribute update failed: {0}")]
    Session(#[from] SessionError),

    #[error("{0}")]
    Other(String),
}

/// Hook run after each statement completes, before its result is published
pub trait ResultInterceptor: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    fn after_completion(
        &self,
        outcome: &StatementOutcome,
        session: &Session,
        ctx: &ExecutionContext,
    ) -> Result<(), InterceptorError>;
}

/// Ordered list of interceptors
///
/// Every interceptor sees every outcome. Errors and panics raised by an
/// interceptor are logged and swallowed; they never change the outcome or
/// stop the rest of the chain.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn ResultInterceptor>>,
}

impl InterceptorChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain with the built-in session parameter interceptors
    pub fn with_defaults() -> Self {
        Self::new()
            .with(Arc::new(NlsFormatInterceptor))
            .with(Arc::new(TimeZoneInterceptor))
    }

    /// Append an interceptor
    pub fn with(mut self, interceptor: Arc<dyn ResultInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    pub fn after_completion(
        &self,
        outcome: &StatementOutcome,
        session: &Session,
        ctx: &ExecutionContext,
    ) {
        for interceptor in &self.interceptors {
            let result = catch_unwind(AssertUnwindSafe(|| {
                interceptor.after_completion(outcome, session, ctx)
            }));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(
                    interceptor = interceptor.name(),
                    error = %e,
                    "interceptor failed"
                ),
                Err(_) => tracing::error!(
                    interceptor = interceptor.name(),
                    "interceptor panicked"
                ),
            }
        }
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("interceptors", &self.names())
            .finish()
    }
}
