#[derive(Debug, thiserror::Error)]
pub enum EntrypointError {
    #[error("usage: {0}")]
    Usage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("render {template}: {detail}")]
    Render { template: String, detail: String },

    #[error("provision error: {0}")]
    Provision(String),

    #[error("spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Supervise(#[from] supervise::SuperviseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EntrypointError>;
