use sf_pipeline::CancelHandle;

/// Sets up a Ctrl+C handler that cancels the running batch
pub fn setup(handle: CancelHandle) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        tracing::info!("Shutdown signal received");
        handle.cancel();
    })
}
