//! Run the conversion script under the office suite's bundled interpreter.
//!
//! The script talks to the office suite over its remote-object bridge; this
//! side only checks that the interpreter and script exist, builds the command
//! line, and hands it to the process supervisor.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use super::pipeline::ConversionRequest;
use crate::config::OfficeConfig;
use crate::process::LaunchSpec;

/// Errors detected before the converter is started.
#[derive(thiserror::Error, Debug)]
pub enum LauncherError {
    #[error("office interpreter not found at {}", path.display())]
    InterpreterNotFound { path: PathBuf },
    #[error("conversion script not found at {}", path.display())]
    ScriptNotFound { path: PathBuf },
    #[error("input file not found at {}", path.display())]
    InputNotFound { path: PathBuf },
}

/// Typical locations of the bundled interpreter on this platform.
#[must_use]
pub fn interpreter_hints() -> &'static [&'static str] {
    if cfg!(windows) {
        &[
            r"C:\Program Files\LibreOffice\program\python.exe",
            r"C:\Program Files (x86)\LibreOffice\program\python.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &["/Applications/LibreOffice.app/Contents/Resources/python"]
    } else {
        &[
            "/usr/lib/libreoffice/program/python",
            "/opt/libreoffice*/program/python",
        ]
    }
}

/// Builds and validates the converter command line.
#[derive(Debug, Clone)]
pub struct ConverterLauncher {
    python: PathBuf,
    script: PathBuf,
}

impl ConverterLauncher {
    /// Create a launcher for the given interpreter and script.
    #[must_use]
    pub fn new(python: impl Into<PathBuf>, script: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            script: script.into(),
        }
    }

    /// Create a launcher from configuration.
    #[must_use]
    pub fn from_config(config: &OfficeConfig) -> Self {
        Self::new(&config.python, &config.script)
    }

    /// Get the interpreter path.
    #[must_use]
    pub fn python(&self) -> &Path {
        &self.python
    }

    /// Get the script path.
    #[must_use]
    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Check that the interpreter, script and input file exist.
    ///
    /// # Errors
    ///
    /// Returns the first missing path as a `LauncherError`.
    pub fn check(&self, request: &ConversionRequest) -> Result<(), LauncherError> {
        if !self.python.exists() {
            return Err(LauncherError::InterpreterNotFound {
                path: self.python.clone(),
            });
        }
        if !self.script.exists() {
            return Err(LauncherError::ScriptNotFound {
                path: self.script.clone(),
            });
        }
        if !request.input.exists() {
            return Err(LauncherError::InputNotFound {
                path: request.input.clone(),
            });
        }
        Ok(())
    }

    fn script_args(&self, request: &ConversionRequest, password: Option<&str>) -> Vec<String> {
        let mut args = vec![
            self.script.to_string_lossy().into_owned(),
            request.input.to_string_lossy().into_owned(),
            request.output.to_string_lossy().into_owned(),
        ];
        if let Some(password) = password {
            args.push(password.to_string());
        }
        args
    }

    /// Launch spec running `python script input output [password]`.
    #[must_use]
    pub fn launch_spec(&self, request: &ConversionRequest) -> LaunchSpec {
        LaunchSpec::new(&self.python).args(self.script_args(request, request.password.as_deref()))
    }

    /// Command line for display, with the password replaced by `***`.
    #[must_use]
    pub fn display_command(&self, request: &ConversionRequest) -> String {
        let redacted = request.password.as_ref().map(|_| "***");
        std::iter::once(self.python.to_string_lossy().into_owned())
            .chain(self.script_args(request, redacted))
            .map(|arg| shell_escape::escape(Cow::Owned(arg)).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
