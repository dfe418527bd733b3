use thiserror::Error;

/// Error type shared by every sensor crate in the workspace.
#[derive(Debug, Error)]
pub enum ThermoError {
    // ── Transport ─────────────────────────────────────────────────────────────
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// The bus interface could not be reached at all.
    #[error("no interface: {0}")]
    NoInterface(String),

    // ── Protocol ──────────────────────────────────────────────────────────────
    /// Every byte of the register frame read back as 0x00.
    #[error("register frame is all zeroes; device disconnected?")]
    AllZeroes,

    /// Every byte of the register frame read back as 0xFF.
    #[error("register frame is all ones; device disconnected?")]
    AllOnes,

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid resolution: {0} bits")]
    InvalidResolution(u8),

    /// The device flagged the reading as faulty.
    #[error("sensor fault (status {status:#04x}): {}", causes.join(", "))]
    Fault { status: u8, causes: Vec<&'static str> },

    // ── State ─────────────────────────────────────────────────────────────────
    #[error("already polling")]
    AlreadyPolling,

    #[error("not polling")]
    NotPolling,

    #[error("no such device: {0}")]
    NoSuchDevice(String),

    #[error("invalid capacity: {0}")]
    InvalidCapacity(usize),

    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The interrupt path produced triggers faster than the poll loop consumed them.
    #[error("too many triggers")]
    TooManyTriggers,

    /// The device did not finish an operation in time.
    #[error("timed out: {0}")]
    Timeout(String),

    // ── Other ─────────────────────────────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("task error: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for ThermoError {
    fn from(e: tokio::task::JoinError) -> Self {
        ThermoError::Task(e.to_string())
    }
}

pub type Result<T, E = ThermoError> = std::result::Result<T, E>;
