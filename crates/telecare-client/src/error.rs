use thiserror::Error;

use telecare_net::NetError;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// Base URLs are mandatory; there are no defaults.
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
}

#[derive(Error, Debug)]
pub enum ApiError {
    /// The backend rejected the session cookie. Handled uniformly across
    /// all operations (redirect to login); never retried here.
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Request failed with status {code}: {message}")]
    Status { code: u16, message: String },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("File must be in png, jpg, jpeg or pdf format")]
    UnsupportedFormat(String),

    #[error("File must not be greater than 2MB ({0} bytes)")]
    FileTooLarge(usize),

    /// A file is already staged; it must be removed explicitly before a
    /// new one can be attached.
    #[error("An attachment is already staged")]
    AttachmentAlreadyStaged,

    #[error("A prescription must contain at least one drug")]
    EmptyPrescription,

    /// The staged file could not be uploaded. The draft is preserved for
    /// retry.
    #[error("Upload failed: {0}")]
    Upload(#[source] ApiError),

    /// The frame could not be handed to the connection manager.
    #[error("Connection unavailable: {0}")]
    Connection(#[source] NetError),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("No active session identity")]
    NoIdentity,
}
