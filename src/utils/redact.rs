//! Redaction of credentials from text bound for logs.

use regex::Regex;
use std::sync::LazyLock;

/// Query parameters whose values are credentials
static SECRET_QUERY_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(appid|api_key|apikey|access_token|token)=([^&\s"'#]+)"#)
        .unwrap_or_else(|e| panic!("secret pattern must compile: {e}"))
});

/// Replace credential values in URLs and error messages with `[REDACTED]`.
pub fn redact_secrets(input: &str) -> String {
    SECRET_QUERY_PARAM
        .replace_all(input, "$1=[REDACTED]")
        .into_owned()
}
