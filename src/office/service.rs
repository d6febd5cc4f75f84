//! Abstract office automation service.
//!
//! The remote-object bridge itself lives outside this crate; anything that
//! can connect to a running office suite, load a document, and store it under
//! a named export filter implements these traits.

use std::fmt;

use async_trait::async_trait;
use url::Url;

/// Export filter used for PowerPoint 2007+ output.
pub const PPTX_FILTER: &str = "Impress MS PowerPoint 2007 XML";

/// Document families a loaded document can be checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Presentation,
    Text,
    Spreadsheet,
    Drawing,
}

impl DocumentKind {
    /// The office service name a document of this kind supports.
    #[must_use]
    pub fn service_name(self) -> &'static str {
        match self {
            Self::Presentation => "com.sun.star.presentation.PresentationDocument",
            Self::Text => "com.sun.star.text.TextDocument",
            Self::Spreadsheet => "com.sun.star.sheet.SpreadsheetDocument",
            Self::Drawing => "com.sun.star.drawing.DrawingDocument",
        }
    }
}

/// Options passed when loading a document.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub password: Option<String>,
    pub read_only: bool,
    pub hidden: bool,
    pub suppress_auto_update: bool,
}

impl LoadOptions {
    /// Options for opening a presentation for conversion.
    #[must_use]
    pub fn for_conversion(password: Option<String>) -> Self {
        Self {
            password,
            read_only: false,
            hidden: true,
            suppress_auto_update: true,
        }
    }
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("read_only", &self.read_only)
            .field("hidden", &self.hidden)
            .field("suppress_auto_update", &self.suppress_auto_update)
            .finish()
    }
}

/// Options passed when storing a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOptions {
    pub format_name: String,
    pub overwrite: bool,
}

impl SaveOptions {
    /// Store as PowerPoint 2007+ XML, replacing any existing file.
    #[must_use]
    pub fn pptx() -> Self {
        Self {
            format_name: PPTX_FILTER.to_string(),
            overwrite: true,
        }
    }
}

/// Which remote call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperation {
    Connect,
    Load,
    Save,
    Dispose,
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => f.write_str("connect"),
            Self::Load => f.write_str("load"),
            Self::Save => f.write_str("save"),
            Self::Dispose => f.write_str("dispose"),
        }
    }
}

/// Any failure reported by the office service.
///
/// Vendor exception types are folded into this one shape; only the message
/// and optional numeric code are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteOperationError {
    pub operation: RemoteOperation,
    pub message: String,
    pub code: Option<i32>,
}

impl RemoteOperationError {
    /// Create an error without a code.
    #[must_use]
    pub fn new(operation: RemoteOperation, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
            code: None,
        }
    }

    /// Attach a vendor error code.
    #[must_use]
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }
}

impl fmt::Display for RemoteOperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.operation, self.message)?;
        if let Some(code) = self.code {
            write!(f, " (code {code})")?;
        }
        Ok(())
    }
}

impl std::error::Error for RemoteOperationError {}

/// Failure to reach the office service.
#[derive(thiserror::Error, Debug)]
pub enum ConnectionError {
    /// Nothing is accepting connections at the endpoint yet.
    #[error("office service not reachable at {endpoint}: {source}")]
    Unreachable {
        endpoint: String,
        source: std::io::Error,
    },
    /// The service answered but refused the session.
    #[error(transparent)]
    Remote(#[from] RemoteOperationError),
}

/// Establishes sessions with a running office suite.
#[async_trait]
pub trait OfficeConnector: Send + Sync {
    type Service: OfficeService;

    /// Connect to the service.
    async fn connect(&self) -> Result<Self::Service, ConnectionError>;
}

/// Document operations on a connected office suite.
#[async_trait]
pub trait OfficeService: Send + Sync {
    type Document: Send + Sync;

    /// Load the document at `url`.
    async fn load(
        &self,
        url: &Url,
        options: &LoadOptions,
    ) -> Result<Self::Document, RemoteOperationError>;

    /// Whether the document supports the service of `kind`.
    fn is_kind(&self, document: &Self::Document, kind: DocumentKind) -> bool;

    /// Store the document at `url` using the named export filter.
    async fn save_as(
        &self,
        document: &Self::Document,
        url: &Url,
        options: &SaveOptions,
    ) -> Result<(), RemoteOperationError>;

    /// Close the document and release its resources.
    async fn dispose(&self, document: Self::Document);
}
