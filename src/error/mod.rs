use thiserror::Error;

/// Which price row a cell came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceKind {
    Gross,
    Net,
}

impl std::fmt::Display for PriceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceKind::Gross => f.write_str("gross"),
            PriceKind::Net => f.write_str("net"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("did not find PDF download link on page '{page_url}'")]
    LinkNotFound { page_url: String },

    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("did not detect price table in {document}")]
    TableNotDetected { document: String },

    #[error("table row {row} has no cell at column {column}")]
    TableShape { row: usize, column: usize },

    #[error("failed to parse date '{text}' from PDF table")]
    DateParse { text: String },

    #[error("failed to parse {kind} price '{text}' from PDF table")]
    PriceParse { kind: PriceKind, text: String },

    #[error("retrieval cancelled")]
    Cancelled,

    #[error("unsupported path query function '{name}'")]
    UnsupportedFunction { name: String },

    #[error("invalid path query: {0}")]
    InvalidQuery(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("request to '{url}' failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to '{url}' returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },
}

impl PriceError {
    /// Cancellation means "no result yet", not bad input.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PriceError::Cancelled)
    }

    /// Transport failures worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            PriceError::Http { source, .. } => source.is_timeout() || source.is_connect(),
            PriceError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl PriceError {
    /// Names the document a parse-stage failure came from.
    pub fn with_document(self, document: &str) -> Self {
        match self {
            PriceError::MalformedDocument(msg) => {
                PriceError::MalformedDocument(format!("{document}: {msg}"))
            }
            PriceError::TableNotDetected { .. } => PriceError::TableNotDetected {
                document: document.to_string(),
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, PriceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_statuses() {
        let busy = PriceError::HttpStatus { url: "https://x.test/".into(), status: 503 };
        let gone = PriceError::HttpStatus { url: "https://x.test/".into(), status: 404 };
        assert!(busy.is_transient());
        assert!(!gone.is_transient());
        assert!(!PriceError::TableNotDetected { document: "PDF".into() }.is_transient());
    }

    #[test]
    fn test_messages_carry_offending_text() {
        let err = PriceError::PriceParse { kind: PriceKind::Net, text: "1x,0".into() };
        assert_eq!(err.to_string(), "failed to parse net price '1x,0' from PDF table");
        assert!(PriceError::Cancelled.is_cancelled());
    }
}
