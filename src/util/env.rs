//! Terminal detection.

use std::io::IsTerminal;

/// Check if stdout is a TTY.
#[must_use]
pub fn stdout_is_tty() -> bool {
    std::io::stdout().is_terminal()
}

/// Check if stderr is a TTY.
#[must_use]
pub fn stderr_is_tty() -> bool {
    std::io::stderr().is_terminal()
}

/// Check if color should be enabled for stdout.
///
/// `no_color` is the already-resolved flag (CLI, `GENPOOL_NO_COLOR`,
/// `NO_COLOR` or config file); `TERM=dumb` and non-TTY output also disable
/// color.
#[must_use]
pub fn should_use_color(no_color: bool) -> bool {
    if no_color {
        return false;
    }

    if std::env::var("TERM").is_ok_and(|t| t == "dumb") {
        return false;
    }

    stdout_is_tty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_no_color_wins() {
        assert!(!should_use_color(true));
    }
}
