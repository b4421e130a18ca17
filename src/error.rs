use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("no page template available")]
    MissingPageTemplate,

    #[error("flowable cannot fit on any page: {0}")]
    UnplaceableFlowable(String),

    #[error("document has no pages")]
    EmptyDocument,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Fonts and the background template are loaded by path; a missing or
    /// unreadable file ends the render step here.
    #[error("asset error: {0}")]
    Asset(String),

    #[error("pdf error: {0}")]
    Pdf(String),

    #[error("data source error: {0}")]
    Source(String),

    #[error("access denied")]
    AccessDenied,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub(crate) fn lopdf_err(err: lopdf::Error) -> ReportError {
    ReportError::Pdf(err.to_string())
}

pub type Result<T, E = ReportError> = std::result::Result<T, E>;
