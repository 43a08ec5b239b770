use thiserror::Error;

/// Failures that stop the server from starting or running.
///
/// Per-connection problems (failed handshakes, undecodable frames, closed
/// sockets) never surface here; they are logged and only end that connection.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server loop is no longer running")]
    LoopClosed,
}

/// Why a `joinGame` was refused.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum JoinRejected {
    #[error("game is full")]
    GameFull,

    #[error("connection already joined")]
    AlreadyJoined,
}
