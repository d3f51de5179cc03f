use elevate::RunningAs;
use std::sync::OnceLock;

static IS_ROOT: OnceLock<bool> = OnceLock::new();

/// Returns whether the current process is running as root/admin.
/// The result is cached on first call using OnceLock.
pub fn is_root() -> bool {
    *IS_ROOT.get_or_init(|| matches!(elevate::check(), RunningAs::Root | RunningAs::Suid))
}

/// One `*` per character typed, so the length is visible but not the text
pub fn mask(input: &str) -> String {
    "*".repeat(input.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask() {
        assert_eq!(mask(""), "");
        assert_eq!(mask("hunter2"), "*******");
        assert_eq!(mask("pässwörd"), "********");
    }
}
