//! This crate implements the client side of HTTP Digest Authentication as specified
//! by IETF RFC 2617 (and the RFC 2069 legacy mode without `qop`).
//!
//! Only MD5 with `qop=auth` is supported. Challenges offering nothing but `auth-int`,
//! or asking for `MD5-sess` or any other algorithm, are rejected instead of being
//! answered with a weaker response.
//!
//! # Examples
//!
//! Basic usage:
//!
//! ```
//! use digest_client::Authorizer;
//!
//! // Value from the WWW-Authenticate HTTP header (usually in a HTTP 401 response)
//! let www_authenticate = r#"Digest realm="testrealm@host.com", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;
//!
//! let mut auth = Authorizer::new();
//! auth.user("Mufasa").pass("Circle Of Life").method("GET").uri("/dir/index.html");
//! assert!(!auth.auth_ready());
//!
//! auth.parse_challenge(www_authenticate).unwrap();
//! assert!(auth.auth_ready());
//!
//! // For this test, we pin the nonce count and the cnonce. They are generated
//! // for you otherwise, and every response gets a fresh pair.
//! auth.pin_cnonce(1, "0a4f113b");
//!
//! let answer = auth.authorization().unwrap();
//! assert_eq!(answer, r#"Digest username="Mufasa", realm="testrealm@host.com", uri="/dir/index.html", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", response="6629fae49393a05397450978507c4ef1", nc=00000001, cnonce="0a4f113b", qop="auth", opaque="5ccc069c403ebaf9f0171e9517f40e41""#);
//! ```
//!
//! [`DigestClient`](struct.DigestClient.html) wraps any blocking
//! [`Transport`](trait.Transport.html) and runs the whole probe / challenge /
//! request cycle.

mod challenge;
mod client;
mod digest;
mod enums;
mod error;
mod utils;

pub use error::{Error, Result};

pub use crate::challenge::{parse_header_map, Challenge};
pub use crate::client::{DigestClient, Transport};
pub use crate::digest::Authorizer;

pub use crate::enums::*;

/// Parse the WWW-Authenticate header value.
/// It's just a convenience method to call [`Challenge::parse()`](struct.Challenge.html#method.parse).
pub fn parse(www_authenticate: &str) -> Result<Challenge> {
    Challenge::parse(www_authenticate)
}

#[test]
fn test_parse_respond() {
    let src = r#"
    Digest
       realm="http-auth@example.org",
       qop="auth, auth-int",
       algorithm=MD5,
       nonce="7ypf/xlj9XXwfDPEoM4URrv/xwf94BcCAzFZH4GiTo0v",
       opaque="FQhe/qaU925kfnzjCev0ciny7QMkPqMAFRtzCUYo5tdS"
    "#;

    let prompt = crate::parse(src).unwrap();
    assert_eq!(prompt.qop, Some(Qop::AUTH));

    let mut auth = Authorizer::new();
    auth.user("Mufasa").pass("Circle of Life");
    auth.prime(prompt);
    auth.pin_cnonce(1, "f2/wE4q74E6zIJEtWaHKaf5wv/H5QzzpXusqGemxURZJ");

    let str = auth
        .authorization_for("GET", "/dir/index.html")
        .unwrap()
        .replace(", ", ",\n  ");

    assert_eq!(
        str,
        r#"
Digest username="Mufasa",
  realm="http-auth@example.org",
  uri="/dir/index.html",
  nonce="7ypf/xlj9XXwfDPEoM4URrv/xwf94BcCAzFZH4GiTo0v",
  response="8ca523f5e9506fed4657c9700eebdbec",
  nc=00000001,
  cnonce="f2/wE4q74E6zIJEtWaHKaf5wv/H5QzzpXusqGemxURZJ",
  qop="auth",
  opaque="FQhe/qaU925kfnzjCev0ciny7QMkPqMAFRtzCUYo5tdS"
"#
        .trim()
    );
}
