//! Selecting how this process was started.

use crate::exec::ExecRequest;

/// The two ways the `minibox` binary can be entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryMode {
    /// Re-executed to join a running container's namespaces and run a
    /// command there.
    NamespaceEntry(ExecRequest),
    /// Ordinary command-line use, including the hidden `init` subcommand.
    Cli,
}

impl EntryMode {
    /// Resolves the mode from the environment.
    ///
    /// Must be the first thing `main` does: namespace entry has to happen
    /// while the process is still single-threaded.
    #[must_use]
    pub fn resolve() -> Self {
        Self::from_request(ExecRequest::from_env())
    }

    fn from_request(request: Option<ExecRequest>) -> Self {
        request.map_or(Self::Cli, Self::NamespaceEntry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_request_means_cli() {
        assert_eq!(EntryMode::from_request(None), EntryMode::Cli);
    }

    #[test]
    fn request_selects_namespace_entry() {
        let request = ExecRequest::from_vars(Some("7".into()), Some("ps".into())).unwrap();
        assert_eq!(
            EntryMode::from_request(Some(request.clone())),
            EntryMode::NamespaceEntry(request)
        );
    }
}
