//! Tests for the presentation conversion pipeline against an in-memory office service.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use office_relay::office::{
    convert_presentation, ConnectionError, ConversionError, ConversionRequest, DocumentKind,
    LoadOptions, OfficeConnector, OfficeService, RemoteOperation, RemoteOperationError,
    SaveOptions,
};
use office_relay::retry::RetryPolicy;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Connect,
    Load { url: Url, password: Option<String> },
    Save { url: Url, filter: String, overwrite: bool },
    Dispose,
}

#[derive(Clone, Default)]
struct FakeOffice {
    calls: Arc<Mutex<Vec<Call>>>,
    connect_failures: u32,
    connects: Arc<AtomicU32>,
    kind: Option<DocumentKind>,
    load_error: Option<RemoteOperationError>,
    save_error: Option<RemoteOperationError>,
}

impl FakeOffice {
    fn presentation() -> Self {
        Self {
            kind: Some(DocumentKind::Presentation),
            ..Self::default()
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

struct FakeDocument {
    kind: DocumentKind,
}

#[async_trait]
impl OfficeConnector for FakeOffice {
    type Service = FakeOffice;

    async fn connect(&self) -> Result<Self::Service, ConnectionError> {
        self.record(Call::Connect);
        let attempt = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.connect_failures {
            return Err(ConnectionError::Remote(RemoteOperationError::new(
                RemoteOperation::Connect,
                format!("connector refused attempt {attempt}"),
            )));
        }
        Ok(self.clone())
    }
}

#[async_trait]
impl OfficeService for FakeOffice {
    type Document = FakeDocument;

    async fn load(
        &self,
        url: &Url,
        options: &LoadOptions,
    ) -> Result<Self::Document, RemoteOperationError> {
        self.record(Call::Load {
            url: url.clone(),
            password: options.password.clone(),
        });
        if let Some(err) = &self.load_error {
            return Err(err.clone());
        }
        Ok(FakeDocument {
            kind: self.kind.unwrap_or(DocumentKind::Text),
        })
    }

    fn is_kind(&self, document: &Self::Document, kind: DocumentKind) -> bool {
        document.kind == kind
    }

    async fn save_as(
        &self,
        _document: &Self::Document,
        url: &Url,
        options: &SaveOptions,
    ) -> Result<(), RemoteOperationError> {
        self.record(Call::Save {
            url: url.clone(),
            filter: options.format_name.clone(),
            overwrite: options.overwrite,
        });
        match &self.save_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn dispose(&self, _document: Self::Document) {
        self.record(Call::Dispose);
    }
}

fn fast_policy(attempts: u32) -> RetryPolicy {
    RetryPolicy::new(NonZeroU32::new(attempts).unwrap(), Duration::from_millis(5))
}

/// A request whose input exists inside `dir`.
fn request_in(dir: &tempfile::TempDir) -> ConversionRequest {
    let input = dir.path().join("deck.ppsx");
    std::fs::write(&input, b"not really a presentation").unwrap();
    ConversionRequest::new(input, dir.path().join("deck.pptx"))
}

fn file_url(path: &std::path::Path) -> Url {
    Url::from_file_path(path).unwrap()
}

#[tokio::test]
async fn converts_in_order() {
    let dir = tempfile::TempDir::new().unwrap();
    let request = request_in(&dir);
    let office = FakeOffice::presentation();

    convert_presentation(&office, &request, &fast_policy(3))
        .await
        .unwrap();

    assert_eq!(
        office.calls(),
        [
            Call::Connect,
            Call::Load {
                url: file_url(&request.input),
                password: None,
            },
            Call::Save {
                url: file_url(&request.output),
                filter: "Impress MS PowerPoint 2007 XML".to_string(),
                overwrite: true,
            },
            Call::Dispose,
        ]
    );
}

#[tokio::test]
async fn connect_is_retried_until_it_succeeds() {
    let dir = tempfile::TempDir::new().unwrap();
    let request = request_in(&dir);
    let office = FakeOffice {
        connect_failures: 2,
        ..FakeOffice::presentation()
    };

    convert_presentation(&office, &request, &fast_policy(5))
        .await
        .unwrap();

    assert_eq!(office.connects.load(Ordering::SeqCst), 3);
    let calls = office.calls();
    assert_eq!(calls.iter().filter(|c| **c == Call::Connect).count(), 3);
    assert_eq!(calls.last(), Some(&Call::Dispose));
}

#[tokio::test]
async fn connect_gives_up_after_max_attempts() {
    let dir = tempfile::TempDir::new().unwrap();
    let request = request_in(&dir);
    let office = FakeOffice {
        connect_failures: u32::MAX,
        ..FakeOffice::presentation()
    };

    let err = convert_presentation(&office, &request, &fast_policy(3))
        .await
        .unwrap_err();

    match err {
        ConversionError::Connect(exhausted) => {
            assert_eq!(exhausted.attempts, 3);
            assert!(exhausted.last_error.to_string().contains("attempt 3"));
        }
        other => panic!("expected connect error, got {other:?}"),
    }
    assert_eq!(office.calls(), [Call::Connect, Call::Connect, Call::Connect]);
}

#[tokio::test]
async fn non_presentation_is_disposed_and_not_saved() {
    let dir = tempfile::TempDir::new().unwrap();
    let request = request_in(&dir);
    let office = FakeOffice {
        kind: Some(DocumentKind::Spreadsheet),
        ..FakeOffice::default()
    };

    let err = convert_presentation(&office, &request, &fast_policy(1))
        .await
        .unwrap_err();

    assert!(matches!(err, ConversionError::NotAPresentation { .. }));
    let calls = office.calls();
    assert!(!calls.iter().any(|c| matches!(c, Call::Save { .. })));
    assert_eq!(calls.last(), Some(&Call::Dispose));
}

#[tokio::test]
async fn save_failure_still_disposes() {
    let dir = tempfile::TempDir::new().unwrap();
    let request = request_in(&dir);
    let office = FakeOffice {
        save_error: Some(RemoteOperationError::new(RemoteOperation::Save, "disk full")),
        ..FakeOffice::presentation()
    };

    let err = convert_presentation(&office, &request, &fast_policy(1))
        .await
        .unwrap_err();

    match err {
        ConversionError::Save { url, source } => {
            assert_eq!(url, file_url(&request.output));
            assert_eq!(source.message, "disk full");
        }
        other => panic!("expected save error, got {other:?}"),
    }
    assert_eq!(office.calls().last(), Some(&Call::Dispose));
}

#[tokio::test]
async fn load_failure_keeps_vendor_code() {
    let dir = tempfile::TempDir::new().unwrap();
    let request = request_in(&dir).password("wrong");
    let office = FakeOffice {
        load_error: Some(
            RemoteOperationError::new(RemoteOperation::Load, "wrong password").with_code(3088),
        ),
        ..FakeOffice::presentation()
    };

    let err = convert_presentation(&office, &request, &fast_policy(1))
        .await
        .unwrap_err();

    match err {
        ConversionError::Load { source, .. } => {
            assert_eq!(source.code, Some(3088));
            assert_eq!(source.operation, RemoteOperation::Load);
        }
        other => panic!("expected load error, got {other:?}"),
    }
    assert!(!office.calls().contains(&Call::Dispose));
}

#[tokio::test]
async fn missing_input_fails_before_connecting() {
    let dir = tempfile::TempDir::new().unwrap();
    let request = ConversionRequest::new(dir.path().join("missing.ppsx"), dir.path().join("out.pptx"));
    let office = FakeOffice::presentation();

    let err = convert_presentation(&office, &request, &fast_policy(3))
        .await
        .unwrap_err();

    assert!(matches!(err, ConversionError::InputNotFound { .. }));
    assert!(office.calls().is_empty());
}

#[tokio::test]
async fn password_reaches_load() {
    let dir = tempfile::TempDir::new().unwrap();
    let request = request_in(&dir).password("s3cret");
    let office = FakeOffice::presentation();

    convert_presentation(&office, &request, &fast_policy(1))
        .await
        .unwrap();

    assert!(office.calls().contains(&Call::Load {
        url: file_url(&request.input),
        password: Some("s3cret".to_string()),
    }));
}
