use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors produced by the OCR pipeline core.
///
/// `Display` renders as `"{Kind}: {detail}"`, matching the wire convention
/// used for `error_message` and `{detail}` responses.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("InputError: {0}")]
    Input(String),

    #[error("InferenceError: {0}")]
    Inference(String),

    #[error("ParseError: {0}")]
    Parse(String),

    #[error("IOError: {0}")]
    Io(#[from] std::io::Error),

    #[error("IOError: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IOError: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("StateError: {0}")]
    State(String),

    #[error("IOError: pdfium: {0}")]
    Pdfium(String),

    #[error("IOError: image: {0}")]
    Image(String),

    #[error("InputError: config: {0}")]
    Config(String),
}

impl CoreError {
    /// The `ErrorKind` prefix used in wire-level `{detail}` / `error_message` strings.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Input(_) | CoreError::Config(_) => "InputError",
            CoreError::Inference(_) => "InferenceError",
            CoreError::Parse(_) => "ParseError",
            CoreError::Io(_) | CoreError::Serde(_) | CoreError::Zip(_) | CoreError::Pdfium(_) | CoreError::Image(_) => "IOError",
            CoreError::State(_) => "StateError",
        }
    }
}
