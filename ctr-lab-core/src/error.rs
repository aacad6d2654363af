use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Data shape error: {0}")]
    DataShape(String),

    /// A test failed on one trial of a batch run. The wrapped error keeps its
    /// own category; match on [`LabError::root_cause`] rather than this variant.
    #[error("Test '{test}' failed on trial {trial}: {source}")]
    TrialFailed {
        test: String,
        trial: usize,
        #[source]
        source: Box<LabError>,
    },
}

impl LabError {
    pub fn invalid(message: impl Into<String>) -> Self {
        LabError::InvalidParameter(message.into())
    }

    pub fn shape(message: impl Into<String>) -> Self {
        LabError::DataShape(message.into())
    }

    /// The innermost error, skipping any `TrialFailed` wrappers.
    pub fn root_cause(&self) -> &LabError {
        match self {
            LabError::TrialFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// The message of the innermost error without its category prefix.
    pub fn message(&self) -> String {
        match self.root_cause() {
            LabError::InvalidParameter(msg) | LabError::DataShape(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self.root_cause(), LabError::InvalidParameter(_))
    }

    pub fn is_data_shape(&self) -> bool {
        matches!(self.root_cause(), LabError::DataShape(_))
    }
}

pub type Result<T> = std::result::Result<T, LabError>;

impl From<validator::ValidationErrors> for LabError {
    fn from(err: validator::ValidationErrors) -> Self {
        LabError::InvalidParameter(err.to_string())
    }
}
