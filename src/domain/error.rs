//! Domain error types.

/// A compile error with position information for signal scripts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }

    /// Format the error with the offending source line and a caret under the
    /// error position.
    pub fn display_with_context(&self, input: &str) -> String {
        let position = self.position.min(input.len());
        let line_start = input[..position].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line_end = input[position..]
            .find('\n')
            .map(|i| position + i)
            .unwrap_or(input.len());
        let line_no = input[..line_start].matches('\n').count() + 1;
        let column = input[line_start..position].chars().count();
        let caret = " ".repeat(column) + "^";
        format!(
            "line {line_no}: {line}\n{pad}{caret}\n{err}",
            line = &input[line_start..line_end],
            pad = " ".repeat(format!("line {line_no}: ").len()),
            err = self
        )
    }
}

/// Top-level error type for siglab.
#[derive(Debug, thiserror::Error)]
pub enum SiglabError {
    #[error("compilation error: {0}")]
    Compilation(#[from] ParseError),

    #[error("loader error: {reason}")]
    Loader { reason: String },

    #[error("prediction error for {instrument}: {reason}")]
    Prediction { instrument: String, reason: String },

    #[error("gateway error: {reason}")]
    Gateway { reason: String },

    #[error("no backtest results for instrument {instrument}")]
    NoInstrument { instrument: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SiglabError {
    pub fn loader(reason: impl Into<String>) -> Self {
        Self::Loader {
            reason: reason.into(),
        }
    }

    pub fn gateway(reason: impl Into<String>) -> Self {
        Self::Gateway {
            reason: reason.into(),
        }
    }

    /// True for failures caused by the submitted code rather than the
    /// infrastructure.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            SiglabError::Compilation(_) | SiglabError::Loader { .. } | SiglabError::Prediction { .. }
        )
    }

    /// Short machine-readable class name.
    pub fn kind(&self) -> &'static str {
        match self {
            SiglabError::Compilation(_) => "compilation",
            SiglabError::Loader { .. } => "loader",
            SiglabError::Prediction { .. } => "prediction",
            SiglabError::Gateway { .. } => "gateway",
            SiglabError::NoInstrument { .. } => "no_instrument",
            SiglabError::ConfigParse { .. }
            | SiglabError::ConfigMissing { .. }
            | SiglabError::ConfigInvalid { .. } => "config",
            SiglabError::Io(_) => "io",
        }
    }
}

impl From<&SiglabError> for std::process::ExitCode {
    fn from(err: &SiglabError) -> Self {
        let code: u8 = match err {
            SiglabError::Io(_) | SiglabError::NoInstrument { .. } => 1,
            SiglabError::ConfigParse { .. }
            | SiglabError::ConfigMissing { .. }
            | SiglabError::ConfigInvalid { .. } => 2,
            SiglabError::Gateway { .. } => 3,
            SiglabError::Compilation(_) | SiglabError::Loader { .. } => 4,
            SiglabError::Prediction { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
