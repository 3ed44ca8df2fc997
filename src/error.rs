pub type AquamarkResult<T> = Result<T, AquamarkError>;

#[derive(thiserror::Error, Debug)]
pub enum AquamarkError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AquamarkError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            AquamarkError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            AquamarkError::render("x")
                .to_string()
                .contains("render error:")
        );
        assert!(
            AquamarkError::encode("x")
                .to_string()
                .contains("encode error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = AquamarkError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
