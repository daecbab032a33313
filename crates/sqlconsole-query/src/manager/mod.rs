//! Batch execution
//!
//! Batches run their units strictly in order on the session's reserved
//! connection. [`AsyncExecutionManager`] schedules batches on a bounded
//! worker pool and hands back a [`PendingBatch`] to poll; [`SyncExecutor`]
//! runs a batch inline on the caller's task. Both share one
//! [`ExecutionPipeline`], so error policy, cancellation, timeouts and
//! interception behave the same either way.

mod async_executor;
mod handle;
mod pipeline;
mod policy;
mod sync_executor;

pub use async_executor::{AsyncExecutionManager, DEFAULT_WORKER_POOL_SIZE};
pub use handle::{BatchId, BatchState, PendingBatch};
pub use pipeline::ExecutionPipeline;
pub use policy::ErrorPolicy;
pub use sync_executor::SyncExecutor;
