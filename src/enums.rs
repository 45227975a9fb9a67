use crate::{Error, Result};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use digest::Digest;
use md5::Md5;

/// Hash algorithm selected by the challenge.
///
/// Only plain MD5 is implemented; `MD5-sess` and the SHA-2 family are rejected
/// when the challenge is parsed.
#[derive(Debug, PartialEq, Clone, Copy)]
#[allow(non_camel_case_types)]
pub enum Algorithm {
    MD5,
}

impl Algorithm {
    /// Calculate a hash of bytes using the selected algorithm, as lowercase hex
    pub fn hash(self, bytes: &[u8]) -> String {
        match self {
            Algorithm::MD5 => {
                let mut hash = Md5::new();
                hash.update(bytes);
                hex::encode(hash.finalize())
            }
        }
    }

    /// Calculate a hash of string's bytes using the selected algorithm
    pub fn hash_str(self, bytes: &str) -> String {
        self.hash(bytes.as_bytes())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    /// Parse from the format used in WWW-Authenticate
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MD5" => Ok(Algorithm::MD5),
            _ => Err(Error::UnsupportedAlgorithm(s.into())),
        }
    }
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::MD5
    }
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Algorithm::MD5 => "MD5",
        })
    }
}

/// QOP field value. `auth-int` is recognised by name only to be refused.
#[derive(Debug, PartialEq, Clone, Copy)]
#[allow(non_camel_case_types)]
pub enum Qop {
    AUTH,
}

impl FromStr for Qop {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auth" => Ok(Qop::AUTH),
            _ => Err(Error::UnsupportedQop(s.into())),
        }
    }
}

impl Display for Qop {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Qop::AUTH => "auth",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Algorithm, Qop};
    use crate::Error;

    #[test]
    fn test_md5_hash() {
        // RFC 1321 test suite
        assert_eq!(Algorithm::MD5.hash_str(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(Algorithm::MD5.hash_str("abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!("MD5".parse::<Algorithm>().unwrap(), Algorithm::MD5);

        for name in &["MD5-sess", "SHA-256", "SHA1", "md5", ""] {
            match name.parse::<Algorithm>() {
                Err(Error::UnsupportedAlgorithm(a)) => assert_eq!(&a, name),
                other => panic!("expected UnsupportedAlgorithm for {:?}, got {:?}", name, other),
            }
        }
    }

    #[test]
    fn test_qop_from_str() {
        assert_eq!("auth".parse::<Qop>().unwrap(), Qop::AUTH);
        assert_eq!(Qop::AUTH.to_string(), "auth");
        assert!(matches!("auth-int".parse::<Qop>(), Err(Error::UnsupportedQop(_))));
    }
}
