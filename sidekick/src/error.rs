use crate::QueryKey;
use std::{error::Error, fmt, sync::Arc};

/// The error type returned by every fallible client operation.
///
/// It's a cheap to clone wrapper around any error, so a single failed request can be handed to
/// every caller that was waiting on it.
#[derive(Clone, Debug)]
pub struct QueryError {
    inner: Arc<Box<dyn Error + Send + Sync>>
}

#[derive(Debug)]
pub struct QueryErrorCompat(QueryError);

impl Error for QueryErrorCompat {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.0.source()
    }
}

impl fmt::Display for QueryErrorCompat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl QueryError {
    pub fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source()
    }

    pub fn compat(self) -> QueryErrorCompat {
        QueryErrorCompat(self)
    }

    /// The client-level cause of this error, if it didn't come from the fetcher itself.
    pub fn kind(&self) -> Option<&ClientError> {
        let inner: &(dyn Error + Send + Sync + 'static) = &**self.inner;
        inner.downcast_ref::<ClientError>()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind(), Some(ClientError::Cancelled(_)))
    }

    /// Creates an error from a plain message. Useful for fetchers that fail without a typed cause.
    pub fn msg<M: Into<String>>(message: M) -> Self {
        ClientError::Message(message.into()).into()
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl<T: Error + Send + Sync + 'static> From<T> for QueryError {
    fn from(e: T) -> Self {
        QueryError {
            inner: Arc::new(Box::new(e))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The fetch was abandoned through `cancel_queries`, an invalidation, or because the caller
    /// that started it was dropped.
    #[error("query {0} was cancelled")]
    Cancelled(QueryKey),
    #[error("data for {0} has a different type than requested")]
    TypeMismatch(QueryKey),
    #[error("request to {url} failed with status {status}")]
    Status { url: String, status: u16 },
    /// The caller of a mutation stopped waiting before the server answered. The request was
    /// dropped and the mutation rolled back.
    #[error("mutation was dropped before the server answered")]
    Abandoned,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("{0}")]
    Message(String)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kind_survives_clone() {
        let err: QueryError = ClientError::Cancelled(QueryKey::from("super-heroes")).into();
        let cloned = err.clone();

        assert!(cloned.is_cancelled());
        assert_eq!(cloned.to_string(), r#"query ["super-heroes"] was cancelled"#);
    }

    #[test]
    fn foreign_errors_have_no_kind() {
        let err: QueryError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();

        assert!(err.kind().is_none());
        assert!(!err.is_cancelled());
    }
}
