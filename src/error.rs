use std::result;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The challenge offers no usable `auth` quality of protection
    #[error("Unsupported qop: {0}")]
    UnsupportedQop(String),

    /// The challenge asks for a hash algorithm other than MD5
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A challenge token without a `key=value` shape. The parser skips these.
    #[error("Malformed challenge token: {0}")]
    MalformedToken(String),

    #[error(transparent)]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error(transparent)]
    HeaderEncoding(#[from] http::header::ToStrError),

    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = result::Result<T, Error>;

impl Error {
    /// Wrap an error returned by the underlying transport
    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Transport(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use std::error::Error as _;
    use std::fmt;

    #[derive(Debug)]
    struct Refused;

    impl fmt::Display for Refused {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("connection refused")
        }
    }

    impl std::error::Error for Refused {}

    #[test]
    fn test_transport_keeps_source() {
        let err = Error::transport(Refused);
        assert_eq!(err.to_string(), "Transport error: connection refused");

        let source = err.source().unwrap();
        assert!(source.downcast_ref::<Refused>().is_some());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Error::UnsupportedQop("auth-int".into()).to_string(),
            "Unsupported qop: auth-int"
        );
        assert_eq!(
            Error::UnsupportedAlgorithm("SHA1".into()).to_string(),
            "Unsupported algorithm: SHA1"
        );
    }
}
