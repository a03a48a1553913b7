//! Numeric log levels, confirmed against
//! `examples/original_source/dss/log/levels.py`.

/// No filtering; the lowest possible level.
pub const ALL: u8 = 0;
/// Diagnostic detail.
pub const DEBUG: u8 = 10;
/// Routine operational messages.
pub const INFO: u8 = 20;
/// Noteworthy but non-error conditions.
pub const NOTICE: u8 = 30;
/// Recoverable problems.
pub const WARNING: u8 = 40;
/// Failed operations.
pub const ERROR: u8 = 50;
/// Errors requiring immediate attention.
pub const CRITICAL: u8 = 60;
/// Action must be taken immediately.
pub const ALERT: u8 = 70;
/// System is unusable.
pub const EMERG: u8 = 80;

/// Resolves a numeric level to its canonical name.
pub fn level_name(level: u8) -> &'static str {
    match level {
        ALL => "ALL",
        DEBUG => "DEBUG",
        INFO => "INFO",
        NOTICE => "NOTICE",
        WARNING => "WARNING",
        ERROR => "ERROR",
        CRITICAL => "CRITICAL",
        ALERT => "ALERT",
        EMERG => "EMERG",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_table_matches_source() {
        assert_eq!(EMERG, 80);
        assert_eq!(ALERT, 70);
        assert_eq!(CRITICAL, 60);
        assert_eq!(ERROR, 50);
        assert_eq!(WARNING, 40);
        assert_eq!(NOTICE, 30);
        assert_eq!(INFO, 20);
        assert_eq!(DEBUG, 10);
        assert_eq!(ALL, 0);
    }

    #[test]
    fn unknown_level_name() {
        assert_eq!(level_name(255), "UNKNOWN");
        assert_eq!(level_name(ERROR), "ERROR");
    }
}
