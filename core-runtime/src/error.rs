use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed setting, from the builder, the environment or logging setup
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
