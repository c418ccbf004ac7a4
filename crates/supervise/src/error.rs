use nix::errno::Errno;

#[derive(Debug, thiserror::Error)]
pub enum SuperviseError {
    #[error("prctl(PR_SET_CHILD_SUBREAPER) failed: {0}")]
    Subreaper(Errno),

    #[error("a SIGTERM forwarder is already active")]
    ForwarderActive,

    #[error("install SIGTERM handler: {0}")]
    Install(Errno),

    #[error("spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("wait for child: {0}")]
    Wait(std::io::Error),
}

pub type Result<T> = std::result::Result<T, SuperviseError>;
