pub type PixelartResult<T> = Result<T, PixelartError>;

#[derive(thiserror::Error, Debug)]
pub enum PixelartError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("config error: {}", .0.join("; "))]
    Config(Vec<String>),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("assembly error: {0}")]
    Assembly(String),

    #[error("PixelLab API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PixelartError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    pub fn assembly(msg: impl Into<String>) -> Self {
        Self::Assembly(msg.into())
    }

    /// Build an API error, keeping at most the first 300 characters of the response body.
    pub fn api(status: u16, body: &str) -> Self {
        Self::Api {
            status,
            body: body.chars().take(300).collect(),
        }
    }
}
