use std::fmt;

#[derive(Debug)]
pub struct CliError(pub String);

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for CliError {}

impl From<String> for CliError {
    fn from(s: String) -> Self {
        CliError(s)
    }
}

impl From<codex_capture::CaptureError> for CliError {
    fn from(e: codex_capture::CaptureError) -> Self {
        CliError(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError(format!("JSON error: {e}"))
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError(format!("IO error: {e}"))
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions_keep_the_message() {
        let from_capture: CliError = codex_capture::CaptureError::Config("no dir".into()).into();
        assert_eq!(from_capture.to_string(), "Configuration error: no dir");

        let from_io: CliError = std::io::Error::other("gone").into();
        assert_eq!(from_io.to_string(), "IO error: gone");

        let from_text: CliError = format!("No readable capture at history index {}", 3).into();
        assert_eq!(from_text.to_string(), "No readable capture at history index 3");
    }
}
