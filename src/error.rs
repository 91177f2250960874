pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Occurs when `kensa.toml` fails to load.
    #[error("failed to load kensa.toml: {0}")]
    LoadError(String),
}
