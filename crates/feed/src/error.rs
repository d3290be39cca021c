use thiserror::Error;

/// Transport and session-level failures for a feed connection.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing credential: {0}")]
    MissingCredentials(&'static str),

    #[error("not connected")]
    NotConnected,
}

/// A venue message that could not be turned into canonical events.
/// Always absorbed at the connection boundary: log and drop.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unrecognized side: {0}")]
    Side(String),

    #[error("unparseable number: {0}")]
    Number(String),

    #[error("price out of range: {0}")]
    PriceOutOfRange(String),

    #[error("negative size: {0}")]
    NegativeSize(String),

    #[error("bad timestamp: {0}")]
    Timestamp(String),

    #[error("unrecognized message: {0}")]
    UnknownEvent(String),
}

/// Failures resolving the current hourly market. Fatal to a capture cycle.
#[derive(Error, Debug)]
pub enum MarketInfoError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed gamma response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("gamma market field missing or malformed: {0}")]
    BadField(&'static str),

    #[error("no market found for slug {0}")]
    NoMarket(String),
}

/// Failures fetching a venue reference price. Never propagated past the
/// retry wrapper.
#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status: {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed response: {0}")]
    Malformed(String),
}
