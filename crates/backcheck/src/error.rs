use std::fmt;

#[derive(Debug)]
pub enum BackcheckError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Invalid or contradictory options (e.g. lower + upper case folding).
    Configuration(String),
    /// Required column absent from a dataset.
    MissingColumn { dataset: String, column: String },
    /// Subject id appears more than once in a dataset.
    DuplicateId { dataset: String, id: String },
    /// Subject id cell is empty.
    MissingId { dataset: String, row: usize },
    /// Survey and back-check id columns have different kinds.
    IdTypeMismatch { survey: String, backcheck: String },
    /// Hypothesis test requested on unusable data.
    InvalidTestInput { test: String, variable: String, reason: String },
    /// CSV read error.
    Csv { dataset: String, message: String },
    /// IO error (file read, etc.).
    Io(String),
}

impl BackcheckError {
    /// True for errors caused by the configuration rather than the data.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::ConfigParse(_) | Self::Configuration(_))
    }
}

impl fmt::Display for BackcheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::Configuration(msg) => write!(f, "configuration error: {msg}"),
            Self::MissingColumn { dataset, column } => {
                write!(f, "dataset '{dataset}': missing column '{column}'")
            }
            Self::DuplicateId { dataset, id } => {
                write!(f, "dataset '{dataset}': id '{id}' is not unique")
            }
            Self::MissingId { dataset, row } => {
                write!(f, "dataset '{dataset}', row {row}: id is missing")
            }
            Self::IdTypeMismatch { survey, backcheck } => {
                write!(
                    f,
                    "id column type differs: survey is {survey}, backcheck is {backcheck}"
                )
            }
            Self::InvalidTestInput { test, variable, reason } => {
                write!(f, "{test} on '{variable}': {reason}")
            }
            Self::Csv { dataset, message } => write!(f, "dataset '{dataset}': {message}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for BackcheckError {}
