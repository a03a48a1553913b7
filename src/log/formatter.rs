//! Renders a [`LogMessage`] to text.
//!
//! Template, time format, and sub-second precision default values, plus the
//! `"\n:: "` exception-line join, are confirmed against
//! `examples/original_source/dss/log/Subscribers.py::Formatter`.

use chrono::{Local, TimeZone};

use super::message::LogMessage;

/// A text formatter for log records.
///
/// The template uses `{formatted_time}`, `{channel}`, `{level_name}`, and
/// `{message}` placeholders in place of the original's `%(name)s`
/// printf-style substitutions, since Rust has no runtime format-string
/// interpreter; field widths are applied directly rather than parsed out of
/// the template.
pub struct Formatter {
    template: String,
    time_format: String,
    sub_second_precision: usize,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(
            "{formatted_time} {channel} {level_name} - {message}",
            "%Y-%m-%d %H:%M:%S",
            3,
        )
    }
}

impl Formatter {
    pub fn new(
        template: impl Into<String>,
        time_format: impl Into<String>,
        sub_second_precision: usize,
    ) -> Self {
        Self {
            template: template.into(),
            time_format: time_format.into(),
            sub_second_precision,
        }
    }

    /// Renders `msg` as a single (possibly multi-line, for exceptions)
    /// string.
    pub fn format(&self, msg: &LogMessage) -> String {
        let formatted_time = self.format_time(msg.timestamp);
        let mut out = self
            .template
            .replace("{formatted_time}", &formatted_time)
            .replace("{channel}", &format!("{:<19}", msg.channel))
            .replace("{level_name}", &format!("{:<5}", msg.level_name()))
            .replace("{message}", &msg.message);

        if let Some((exc_type, exc_txt)) = &msg.exc_info {
            out.push('\n');
            out.push_str(&Self::format_exception(exc_type, exc_txt));
        }
        out
    }

    fn format_time(&self, timestamp: f64) -> String {
        let secs = timestamp.trunc() as i64;
        let nanos = (timestamp.fract() * 1_000_000_000.0).round() as u32;
        let dt = Local
            .timestamp_opt(secs, nanos)
            .single()
            .unwrap_or_else(Local::now);
        let base = dt.format(&self.time_format).to_string();
        if self.sub_second_precision == 0 {
            return base;
        }
        let precision = self.sub_second_precision.min(9);
        let fraction = format!("{nanos:09}");
        format!("{base}.{}", &fraction[..precision])
    }

    /// Joins a rendered exception's lines with `"\n:: "`, matching
    /// `Formatter._format_exception`'s traceback join in the original.
    fn format_exception(exc_type: &str, exc_txt: &str) -> String {
        let mut lines = vec![exc_type.to_string()];
        lines.extend(exc_txt.lines().map(str::to_string));
        lines.join("\n:: ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::levels;
    use crate::log::message::CallerLocation;

    #[test]
    fn format_includes_channel_and_message() {
        let msg = LogMessage::new(
            levels::WARNING,
            "app.sub".to_string(),
            "disk low".to_string(),
            CallerLocation::unspecified(),
        );
        let formatter = Formatter::default();
        let rendered = formatter.format(&msg);
        assert!(rendered.contains("app.sub"));
        assert!(rendered.contains("WARNI"));
        assert!(rendered.contains("disk low"));
    }

    #[test]
    fn exception_lines_joined_with_double_colon() {
        let msg = LogMessage::new(
            levels::ERROR,
            "app".to_string(),
            "boom".to_string(),
            CallerLocation::unspecified(),
        )
        .with_exception("PanicError".to_string(), "line one\nline two".to_string());
        let rendered = Formatter::default().format(&msg);
        assert!(rendered.contains("PanicError\n:: line one\n:: line two"));
    }
}
