//! Presentation conversion: connect, load, verify, save, dispose.

use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

use super::service::{
    ConnectionError, DocumentKind, LoadOptions, OfficeConnector, OfficeService,
    RemoteOperationError, SaveOptions,
};
use crate::retry::{retry, RetryExhaustedError, RetryPolicy};

/// Input, output and optional password for one conversion.
#[derive(Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub password: Option<String>,
}

impl ConversionRequest {
    /// Create a request without a password.
    #[must_use]
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            password: None,
        }
    }

    /// Set the document password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

impl fmt::Debug for ConversionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionRequest")
            .field("input", &self.input)
            .field("output", &self.output)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Errors from a conversion. The first failing step ends the conversion.
#[derive(thiserror::Error, Debug)]
pub enum ConversionError {
    #[error("input file not found: {}", path.display())]
    InputNotFound { path: PathBuf },
    #[error("cannot express {} as a file URL", path.display())]
    InvalidPath { path: PathBuf },
    #[error("could not connect to office service: {0}")]
    Connect(#[from] RetryExhaustedError<ConnectionError>),
    #[error("failed to load {url}: {source}")]
    Load {
        url: Url,
        source: RemoteOperationError,
    },
    #[error("{url} is not a presentation document")]
    NotAPresentation { url: Url },
    #[error("failed to save {url}: {source}")]
    Save {
        url: Url,
        source: RemoteOperationError,
    },
}

/// Convert a filesystem path into an absolute `file://` URL.
///
/// # Errors
///
/// Returns `ConversionError::InvalidPath` if the path cannot be made absolute
/// or expressed as a URL.
pub fn to_file_url(path: &Path) -> Result<Url, ConversionError> {
    let invalid = || ConversionError::InvalidPath {
        path: path.to_path_buf(),
    };
    let absolute = std::path::absolute(path).map_err(|_| invalid())?;
    Url::from_file_path(&absolute).map_err(|()| invalid())
}

/// Convert a presentation to PowerPoint 2007+ XML through the office service.
///
/// Connecting is retried according to `policy`; every later step fails the
/// conversion on its first error. A loaded document is always disposed, also
/// when it turns out not to be a presentation or saving fails.
///
/// # Errors
///
/// Returns the `ConversionError` of the first step that failed.
pub async fn convert_presentation<C>(
    connector: &C,
    request: &ConversionRequest,
    policy: &RetryPolicy,
) -> Result<(), ConversionError>
where
    C: OfficeConnector,
{
    if !request.input.exists() {
        return Err(ConversionError::InputNotFound {
            path: request.input.clone(),
        });
    }
    let input_url = to_file_url(&request.input)?;
    let output_url = to_file_url(&request.output)?;

    tracing::info!(input = %input_url, output = %output_url, "Converting presentation");

    let service = retry(policy, || connector.connect()).await?;

    let load_options = LoadOptions::for_conversion(request.password.clone());
    tracing::debug!(options = ?load_options, "Loading document");
    let document = service
        .load(&input_url, &load_options)
        .await
        .map_err(|source| ConversionError::Load {
            url: input_url.clone(),
            source,
        })?;

    if !service.is_kind(&document, DocumentKind::Presentation) {
        tracing::warn!(url = %input_url, "Loaded document is not a presentation");
        service.dispose(document).await;
        return Err(ConversionError::NotAPresentation { url: input_url });
    }

    let save_options = SaveOptions::pptx();
    tracing::debug!(filter = %save_options.format_name, "Storing document");
    let saved = service.save_as(&document, &output_url, &save_options).await;
    service.dispose(document).await;

    saved.map_err(|source| ConversionError::Save {
        url: output_url.clone(),
        source,
    })?;

    tracing::info!(output = %output_url, "Presentation converted");
    Ok(())
}
