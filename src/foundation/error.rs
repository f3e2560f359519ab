/// Convenience result type used across tickdown.
pub type TickdownResult<T> = Result<T, TickdownError>;

/// Top-level error taxonomy used by engine APIs.
///
/// Errors propagate freely inside the crate, but never across the session
/// boundary: the render scheduler converts every failure into degraded
/// output plus the normal completion contract.
#[derive(thiserror::Error, Debug)]
pub enum TickdownError {
    /// Invalid caller-provided configuration data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors while building atlases/layouts or compositing frames.
    #[error("render error: {0}")]
    Render(String),

    /// Errors from the encoding session (ffmpeg spawn, pipe writes, teardown).
    #[error("encode error: {0}")]
    Encode(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TickdownError {
    /// Build a [`TickdownError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`TickdownError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`TickdownError::Encode`] value.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_pick_matching_variants() {
        assert!(matches!(
            TickdownError::validation("x"),
            TickdownError::Validation(_)
        ));
        assert!(matches!(TickdownError::render("x"), TickdownError::Render(_)));
        assert!(matches!(TickdownError::encode("x"), TickdownError::Encode(_)));
    }

    #[test]
    fn anyhow_errors_convert_transparently() {
        let e: TickdownError = anyhow::anyhow!("boom").into();
        assert!(matches!(e, TickdownError::Other(_)));
        assert_eq!(e.to_string(), "boom");
    }
}
