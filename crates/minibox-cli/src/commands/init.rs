//! `minibox init`: Container init entrypoint (internal).

/// Executes the hidden `init` command inside a new container.
///
/// Only returns if setup fails; on success the process image is replaced by
/// the container command.
///
/// # Errors
///
/// Returns the setup failure.
pub fn execute() -> anyhow::Result<()> {
    match minibox_runtime::init::run_init() {
        Ok(never) => match never {},
        Err(e) => {
            tracing::error!(error = %e, "container init failed");
            Err(e.into())
        }
    }
}
