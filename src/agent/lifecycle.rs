use std::fmt;

/// Lifecycle of one agent version.
///
/// `Parsed → Installing → Installed → Activating → Active`. A failed install
/// drops back to `Parsed` so the next attempt starts over; a failed sweep
/// drops back to `Installed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Parsed,
    Installing,
    Installed,
    Activating,
    Active,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Lifecycle::Parsed => "parsed",
            Lifecycle::Installing => "installing",
            Lifecycle::Installed => "installed",
            Lifecycle::Activating => "activating",
            Lifecycle::Active => "active",
        };
        f.write_str(s)
    }
}
