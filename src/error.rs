use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to parse {}: {source}", path.display())]
    ParseError {
        path: PathBuf,
        #[source]
        source: syn::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {}: {reason}", path.display())]
    InvalidConfig { path: PathBuf, reason: String },

    #[error("no such file or directory: {}", .0.display())]
    NotFound(PathBuf),

    #[error("output directory {} is not empty -- pick a fresh --out path", .0.display())]
    OutputNotEmpty(PathBuf),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}
