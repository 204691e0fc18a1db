use std::fmt;

/// Lifecycle of a transport.
///
/// ```text
/// Active --shutdown()--> ShuttingDown --process ends--> Exited
/// Active --process ends--> Exited | Errored
/// ```
/// Nothing leaves `Exited` or `Errored`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Active,
    ShuttingDown,
    Exited,
    Errored,
}

impl Lifecycle {
    /// Only an active transport reads inbound frames or writes outbound ones.
    pub fn is_active(self) -> bool {
        self == Lifecycle::Active
    }

    /// The process has ended and its outcome has been reported.
    pub fn is_terminal(self) -> bool {
        matches!(self, Lifecycle::Exited | Lifecycle::Errored)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifecycle::Active => "active",
            Lifecycle::ShuttingDown => "shutting-down",
            Lifecycle::Exited => "exited",
            Lifecycle::Errored => "errored",
        };
        f.write_str(name)
    }
}
