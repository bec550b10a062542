use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use tracing::warn;
use tracing_subscriber::EnvFilter;

pub mod cli;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod ordered;
pub mod transport;

#[cfg(test)]
mod testing;

pub use dispatch::{Call, Dispatcher, Resolved};
pub use error::{Error, Result};
pub use model::{ApiCommand, ApiMethod, ApiModule, ApiOption, OptionLocation, ScyllaApi, Verb};
pub use ordered::OrderedMap;
pub use transport::{ClientConfig, HttpRequest, HttpResponse, RestClient, Transport, TransportError};

// =====================
// Output
// =====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Body printed as received, trailing whitespace aside.
    #[default]
    Plain,
    /// JSON kept on one line when it fits in `width`, otherwise indented.
    Pretty { width: usize, indent: usize },
}

impl OutputFormat {
    pub const DEFAULT_WIDTH: usize = 200;
    pub const DEFAULT_INDENT: usize = 1;

    #[must_use]
    pub fn pretty() -> Self {
        OutputFormat::Pretty {
            width: Self::DEFAULT_WIDTH,
            indent: Self::DEFAULT_INDENT,
        }
    }

    /// Parse `WIDTH[:INDENT]`.
    ///
    /// # Errors
    ///
    /// A message suitable for a CLI usage error.
    pub fn parse_pretty_options(s: &str) -> std::result::Result<Self, String> {
        let (width, indent) = match s.split_once(':') {
            Some((w, i)) => (w, Some(i)),
            None => (s, None),
        };
        let width = width
            .trim()
            .parse::<usize>()
            .map_err(|_| format!("invalid width '{width}', expected WIDTH[:INDENT]"))?;
        let indent = match indent {
            Some(i) => i
                .trim()
                .parse::<usize>()
                .map_err(|_| format!("invalid indent '{i}', expected WIDTH[:INDENT]"))?,
            None => Self::DEFAULT_INDENT,
        };
        Ok(OutputFormat::Pretty { width, indent })
    }
}

/// Render a response body for the terminal. Non-JSON bodies are returned
/// unchanged.
#[must_use]
pub fn format_body(body: &str, format: OutputFormat) -> String {
    let OutputFormat::Pretty { width, indent } = format else {
        return body.trim_end().to_string();
    };
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim_end().to_string();
    };
    let compact = value.to_string();
    if compact.len() <= width {
        return compact;
    }
    let indent = " ".repeat(indent);
    let mut buf = Vec::new();
    let mut ser =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(indent.as_bytes()));
    if value.serialize(&mut ser).is_err() {
        return compact;
    }
    String::from_utf8(buf).unwrap_or(compact)
}

/// Print a response and map its status to an exit code: 0 on success, 1 otherwise.
pub fn output_response(resp: &HttpResponse, format: OutputFormat) -> i32 {
    let text = format_body(&resp.body, format);
    if resp.is_success() {
        if !text.is_empty() {
            println!("{text}");
        }
        0
    } else {
        eprintln!("HTTP {}", resp.status);
        if !text.is_empty() {
            println!("{text}");
        }
        1
    }
}

// =====================
// Templates
// =====================

/// Replace `{name}` placeholders. Unknown placeholders are left as they are.
pub fn substitute_template(template: &str, vars: &HashMap<String, String>) -> String {
    static PLACEHOLDER_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*)\}").expect("valid regex"));
    PLACEHOLDER_RE
        .replace_all(template, |caps: &regex::Captures| {
            let key = &caps[1];
            match vars.get(key) {
                Some(v) => v.clone(),
                None => {
                    warn!("no value for placeholder '{{{}}}' in '{}'", key, template);
                    caps[0].to_string()
                }
            }
        })
        .to_string()
}

// =====================
// Logging
// =====================

/// Install a stderr subscriber. `RUST_LOG` wins over `debug`.
pub fn setup_tracing(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A subscriber may already be set, e.g. by a test harness.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== substitute_template tests ====================

    #[test]
    fn test_substitute_template_single_var() {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "mylogger".to_string());
        let result = substitute_template("system/logger/{name}", &vars);
        assert_eq!(result, "system/logger/mylogger");
    }

    #[test]
    fn test_substitute_template_multiple_vars() {
        let mut vars = HashMap::new();
        vars.insert("keyspace".to_string(), "ks".to_string());
        vars.insert("cf".to_string(), "t1".to_string());
        let result = substitute_template("column_family/{keyspace}:{cf}/ratio", &vars);
        assert_eq!(result, "column_family/ks:t1/ratio");
    }

    #[test]
    fn test_substitute_template_missing_var_left_verbatim() {
        let vars = HashMap::new();
        let result = substitute_template("v2/error_injection/injection/{injection}", &vars);
        assert_eq!(result, "v2/error_injection/injection/{injection}");
    }

    #[test]
    fn test_substitute_template_no_placeholders() {
        let mut vars = HashMap::new();
        vars.insert("unused".to_string(), "x".to_string());
        assert_eq!(substitute_template("system/uptime_ms", &vars), "system/uptime_ms");
    }

    #[test]
    fn test_substitute_template_ignores_non_identifier_braces() {
        let mut vars = HashMap::new();
        vars.insert("1".to_string(), "x".to_string());
        assert_eq!(substitute_template("a/{1}/{}", &vars), "a/{1}/{}");
    }

    // ==================== output tests ====================

    #[test]
    fn test_parse_pretty_options_width_and_indent() {
        assert_eq!(
            OutputFormat::parse_pretty_options("80:4").unwrap(),
            OutputFormat::Pretty { width: 80, indent: 4 }
        );
    }

    #[test]
    fn test_parse_pretty_options_width_only() {
        assert_eq!(
            OutputFormat::parse_pretty_options("120").unwrap(),
            OutputFormat::Pretty { width: 120, indent: 1 }
        );
    }

    #[test]
    fn test_parse_pretty_options_rejects_garbage() {
        assert!(OutputFormat::parse_pretty_options("wide").is_err());
        assert!(OutputFormat::parse_pretty_options("80:x").is_err());
    }

    #[test]
    fn test_format_body_plain_is_verbatim() {
        let body = "{\"a\": 1}\n";
        assert_eq!(format_body(body, OutputFormat::Plain), "{\"a\": 1}");
    }

    #[test]
    fn test_format_body_pretty_fits_on_one_line() {
        let body = "{ \"a\" : [1, 2] }";
        assert_eq!(format_body(body, OutputFormat::pretty()), "{\"a\":[1,2]}");
    }

    #[test]
    fn test_format_body_pretty_wraps_when_too_wide() {
        let body = r#"{"a":[1,2]}"#;
        let out = format_body(body, OutputFormat::Pretty { width: 5, indent: 2 });
        assert_eq!(out, "{\n  \"a\": [\n    1,\n    2\n  ]\n}");
    }

    #[test]
    fn test_format_body_pretty_non_json_passthrough() {
        assert_eq!(format_body("not json", OutputFormat::pretty()), "not json");
    }

    #[test]
    fn test_output_response_exit_codes() {
        let ok = HttpResponse {
            status: 200,
            body: String::new(),
        };
        let bad = HttpResponse {
            status: 500,
            body: "\"boom\"".to_string(),
        };
        assert_eq!(output_response(&ok, OutputFormat::Plain), 0);
        assert_eq!(output_response(&bad, OutputFormat::Plain), 1);
    }
}
