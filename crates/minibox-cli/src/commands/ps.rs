//! `minibox ps`: List containers.

use minibox_common::config::RuntimeConfig;
use minibox_runtime::engine::Engine;

use crate::output::render_table;

/// Executes the `ps` command.
///
/// Records whose process has died are reported, and saved, as exited.
///
/// # Errors
///
/// Returns an error if the container records cannot be listed.
pub fn execute(config: RuntimeConfig) -> anyhow::Result<()> {
    let engine = Engine::new(config);
    let rows: Vec<Vec<String>> = engine
        .list()?
        .into_iter()
        .map(|c| {
            vec![
                c.id.to_string(),
                c.name,
                c.pid.map_or_else(|| "-".to_string(), |p| p.to_string()),
                c.status.to_string(),
                c.command,
                c.ip.map_or_else(|| "-".to_string(), |ip| ip.to_string()),
                c.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
        })
        .collect();

    print!(
        "{}",
        render_table(&["ID", "NAME", "PID", "STATUS", "COMMAND", "IP", "CREATED"], &rows)
    );
    Ok(())
}
