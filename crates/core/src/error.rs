use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for stylepipe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for stylepipe operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A specifier resolved to a path that could not be read
    #[error("Unresolved specifier: {} ({message})", path.display())]
    UnresolvedSpecifier { path: PathBuf, message: String },

    /// SASS or CSS syntax errors
    #[error("Compile error in {}: {message}", file.display())]
    Compile { file: PathBuf, message: String },

    /// A style file with an extension the compiler does not handle
    #[error("Unsupported style extension {extension:?} for {}", file.display())]
    UnsupportedExtension { file: PathBuf, extension: String },

    /// PostCSS stage failures
    #[error("Transform error in {}: {message}", file.display())]
    Transform { file: PathBuf, message: String },

    /// Temp artifact write failures
    #[error("Failed to write artifact for {}: {source}", file.display())]
    Artifact {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Bundler hook failures
    #[error("Hook error: {0}")]
    Hook(String),

    /// File watching errors
    #[error("Watcher error: {0}")]
    Watcher(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Creates a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an unresolved specifier error
    pub fn unresolved(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::UnresolvedSpecifier {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a compile error
    pub fn compile(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Compile {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported extension error
    pub fn unsupported_extension(file: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self::UnsupportedExtension {
            file: file.into(),
            extension: extension.into(),
        }
    }

    /// Creates a transform error
    pub fn transform(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Transform {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Creates an artifact write error
    pub fn artifact(file: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Artifact {
            file: file.into(),
            source,
        }
    }

    /// Creates a hook error
    pub fn hook(msg: impl Into<String>) -> Self {
        Self::Hook(msg.into())
    }

    /// Creates a watcher error
    pub fn watcher(msg: impl Into<String>) -> Self {
        Self::Watcher(msg.into())
    }

    /// Creates an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Adds context to any error
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// The source file this error is attributed to, if any
    pub fn source_path(&self) -> Option<&Path> {
        match self {
            Self::UnresolvedSpecifier { path, .. } => Some(path),
            Self::Compile { file, .. }
            | Self::UnsupportedExtension { file, .. }
            | Self::Transform { file, .. }
            | Self::Artifact { file, .. } => Some(file),
            _ => None,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::with_context(context, e))
    }
}
