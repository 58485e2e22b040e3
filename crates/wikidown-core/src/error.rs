pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed document snapshot: {message}")]
    Xml { message: String },

    #[error("Invalid conversion options: {message}")]
    InvalidConfig { message: String },
}
