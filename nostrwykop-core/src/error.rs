//! Error types for the aggregation engine.
//!
//! Only transport-level and precondition failures surface to callers.
//! Decode-class problems (malformed npub input, broken profile JSON, a
//! message that fails to decrypt) are recovered locally with documented
//! defaults and never appear here.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("relay pool is not connected")]
    Connectivity,

    #[error("no signer attached; write operations require one")]
    SignerMissing,

    #[error("relay error: {0}")]
    Relay(String),

    #[error("signer error: {0}")]
    Signer(String),

    #[error("invalid event id: {0}")]
    InvalidId(String),

    #[error("invalid public key: {0}")]
    InvalidKey(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}
