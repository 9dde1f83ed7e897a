pub mod ingest;
pub mod report;

/// Runs a synchronous handler from async code. Store calls and retry
/// backoff block, so the worker hands its other tasks to a fresh thread
/// while the handler runs. Needs the multi-threaded tokio runtime.
pub fn run_blocking<T>(handler: impl FnOnce() -> T) -> T {
    tokio::task::block_in_place(handler)
}
