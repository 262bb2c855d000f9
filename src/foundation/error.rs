/// Convenience result type used across layerstack.
pub type LayerstackResult<T> = Result<T, LayerstackError>;

/// Top-level error taxonomy used by engine APIs.
///
/// Scene-mutation errors are always returned before anything is committed, so a caller that sees
/// an `Err` can keep using the same scene and history.
#[derive(thiserror::Error, Debug)]
pub enum LayerstackError {
    /// An operation referenced a layer, selection entry or export job that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// `undo` was called with an empty past.
    #[error("nothing to undo")]
    NothingToUndo,

    /// `redo` was called with an empty future.
    #[error("nothing to redo")]
    NothingToRedo,

    /// A transform or geometry request was degenerate (e.g. non-finite values).
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Another export is already running against the same scene.
    #[error("busy exporting: {0}")]
    BusyExporting(String),

    /// A frame could not be produced.
    #[error("render failure: {0}")]
    RenderFailure(String),

    /// The encoder collaborator rejected a frame or failed to finalize.
    #[error("encode failure: {0}")]
    EncodeFailure(String),

    /// Invalid user-provided or scene data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LayerstackError {
    /// Build a [`LayerstackError::NotFound`] value.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Build a [`LayerstackError::InvalidGeometry`] value.
    pub fn invalid_geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    /// Build a [`LayerstackError::BusyExporting`] value.
    pub fn busy_exporting(msg: impl Into<String>) -> Self {
        Self::BusyExporting(msg.into())
    }

    /// Build a [`LayerstackError::RenderFailure`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::RenderFailure(msg.into())
    }

    /// Build a [`LayerstackError::EncodeFailure`] value.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::EncodeFailure(msg.into())
    }

    /// Build a [`LayerstackError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`LayerstackError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Re-tag as [`LayerstackError::RenderFailure`] unless it already is one.
    pub(crate) fn into_render_failure(self) -> Self {
        match self {
            Self::RenderFailure(_) => self,
            other => Self::RenderFailure(other.to_string()),
        }
    }

    /// Re-tag as [`LayerstackError::EncodeFailure`] unless it already is one.
    pub(crate) fn into_encode_failure(self) -> Self {
        match self {
            Self::EncodeFailure(_) => self,
            other => Self::EncodeFailure(other.to_string()),
        }
    }

    /// `true` for errors that stop an export job (render or encode failures).
    pub fn is_job_fatal(&self) -> bool {
        matches!(self, Self::RenderFailure(_) | Self::EncodeFailure(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
