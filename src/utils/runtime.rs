use anyhow::Result;

/// Everything in focusboard runs on one logical thread, the daemon included.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
