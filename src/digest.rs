use crate::utils::QuoteForDigest;
use crate::{Algorithm, Challenge, Qop, Result};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Random bytes in a generated client nonce (hex encoded, so twice as many chars)
const CNONCE_BYTES: usize = 8;

/// Largest nonce count that still renders as exactly 8 digits
const NC_MAX: u32 = 99_999_999;

/// Nonce counter and client nonce. Both change together, under one lock.
struct NonceCounter {
    nc: u32,
    cnonce: String,
    /// Frozen counter and cnonce for reproducible digests
    pinned: bool,
    rng: Box<dyn RngCore + Send>,
}

impl NonceCounter {
    fn advance(&mut self) {
        if self.pinned {
            return;
        }
        let mut bytes = [0u8; CNONCE_BYTES];
        self.rng.fill_bytes(&mut bytes);
        self.cnonce = hex::encode(bytes);
        self.nc = if self.nc >= NC_MAX {
            log::warn!("nonce count exhausted, starting over at 1");
            1
        } else {
            self.nc + 1
        };
    }
}

/// Credentials plus the server state needed to answer a Digest challenge.
///
/// An `Authorizer` starts out not ready. Feed it a `WWW-Authenticate` value via
/// [`parse_challenge()`](#method.parse_challenge) and it will render
/// `Authorization` values until the server sends a new challenge.
///
/// Responses can be computed through a shared reference from several threads;
/// the nonce count and client nonce are updated under an internal lock.
/// Re-priming takes `&mut self`, so challenge updates are serialized by the caller.
pub struct Authorizer {
    username: String,
    password: String,
    method: String,
    uri: String,
    realm: String,
    nonce: String,
    opaque: String,
    qop: Option<Qop>,
    algorithm: Algorithm,
    ready: bool,
    counter: Mutex<NonceCounter>,
}

impl Default for Authorizer {
    fn default() -> Self {
        Self::with_rng(Box::new(StdRng::from_entropy()))
    }
}

impl Authorizer {
    /// Empty authorizer drawing client nonces from the OS-seeded `StdRng`
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty authorizer drawing client nonces from the given generator
    pub fn with_rng(rng: Box<dyn RngCore + Send>) -> Self {
        Authorizer {
            username: String::new(),
            password: String::new(),
            method: String::new(),
            uri: String::new(),
            realm: String::new(),
            nonce: String::new(),
            opaque: String::new(),
            qop: None,
            algorithm: Algorithm::default(),
            ready: false,
            counter: Mutex::new(NonceCounter {
                nc: 0,
                cnonce: String::new(),
                pinned: false,
                rng,
            }),
        }
    }

    pub fn user<S: Into<String>>(&mut self, username: S) -> &mut Self {
        self.username = username.into();
        self
    }

    pub fn pass<S: Into<String>>(&mut self, password: S) -> &mut Self {
        self.password = password.into();
        self
    }

    /// Method used by [`authorization()`](#method.authorization)
    pub fn method<S: Into<String>>(&mut self, method: S) -> &mut Self {
        self.method = method.into();
        self
    }

    /// Request URI used by [`authorization()`](#method.authorization)
    pub fn uri<S: Into<String>>(&mut self, uri: S) -> &mut Self {
        self.uri = uri.into();
        self
    }

    /// Freeze the nonce count and client nonce, so that digests are reproducible.
    /// Only meant for checking against known vectors.
    pub fn pin_cnonce<S: Into<String>>(&mut self, nc: u32, cnonce: S) -> &mut Self {
        let counter = self.counter.get_mut().unwrap_or_else(PoisonError::into_inner);
        counter.nc = nc;
        counter.cnonce = cnonce.into();
        counter.pinned = true;
        self
    }

    /// Parse a `WWW-Authenticate` value and prime the authorizer with it.
    ///
    /// The nonce count is kept across challenges. On error nothing is applied
    /// and the authorizer is left not ready.
    pub fn parse_challenge(&mut self, challenge: &str) -> Result<()> {
        match Challenge::parse(challenge) {
            Ok(parsed) => {
                self.prime(parsed);
                Ok(())
            }
            Err(e) => {
                self.ready = false;
                Err(e)
            }
        }
    }

    /// Prime the authorizer with an already parsed challenge
    pub fn prime(&mut self, challenge: Challenge) {
        log::debug!(
            "digest challenge for realm {:?} (qop {:?}, stale {})",
            challenge.realm,
            challenge.qop,
            challenge.stale
        );
        self.realm = challenge.realm;
        self.nonce = challenge.nonce;
        self.opaque = challenge.opaque.unwrap_or_default();
        self.qop = challenge.qop;
        self.algorithm = challenge.algorithm;
        self.ready = true;
    }

    /// True once a challenge has been parsed successfully
    pub fn auth_ready(&self) -> bool {
        self.ready
    }

    /// Forget readiness, e.g. after the credentials were changed
    pub fn reauth(&mut self) {
        self.ready = false;
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn opaque(&self) -> Option<&str> {
        if self.opaque.is_empty() {
            None
        } else {
            Some(&self.opaque)
        }
    }

    pub fn qop(&self) -> Option<Qop> {
        self.qop
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Number of responses computed under `qop=auth` so far
    pub fn nonce_count(&self) -> u32 {
        self.lock_counter().nc
    }

    /// Client nonce used for the last response
    pub fn cnonce(&self) -> String {
        self.lock_counter().cnonce.clone()
    }

    pub fn a1(&self) -> String {
        format!("{}:{}:{}", self.username, self.realm, self.password)
    }

    pub fn ha1(&self) -> String {
        self.algorithm.hash_str(&self.a1())
    }

    pub fn a2(&self, method: &str, uri: &str) -> String {
        format!("{}:{}", method, uri)
    }

    pub fn ha2(&self, method: &str, uri: &str) -> String {
        self.algorithm.hash_str(&self.a2(method, uri))
    }

    /// Compute the request digest. Under `qop=auth` this consumes a fresh
    /// client nonce and bumps the nonce count.
    pub fn response(&self, method: &str, uri: &str) -> String {
        let mut counter = self.lock_counter();
        self.response_locked(&mut counter, method, uri)
    }

    fn response_locked(&self, counter: &mut NonceCounter, method: &str, uri: &str) -> String {
        let ha1 = self.ha1();
        let ha2 = self.ha2(method, uri);

        let kd = match self.qop {
            Some(qop) => {
                counter.advance();
                format!(
                    "{ha1}:{nonce}:{nc:08}:{cnonce}:{qop}:{ha2}",
                    ha1 = ha1,
                    nonce = self.nonce,
                    nc = counter.nc,
                    cnonce = counter.cnonce,
                    qop = qop,
                    ha2 = ha2
                )
            }
            None => format!("{}:{}:{}", ha1, self.nonce, ha2),
        };

        self.algorithm.hash_str(&kd)
    }

    /// `Authorization` value for the method and URI set on the builder.
    /// None until a challenge has been parsed.
    pub fn authorization(&self) -> Option<String> {
        self.authorization_for(&self.method, &self.uri)
    }

    /// `Authorization` value for the given request line. None until a challenge has been parsed.
    pub fn authorization_for(&self, method: &str, uri: &str) -> Option<String> {
        if !self.ready {
            return None;
        }

        let mut params = Vec::with_capacity(9);
        params.push(format!("username=\"{}\"", self.username.quote_for_digest()));
        params.push(format!("realm=\"{}\"", self.realm.quote_for_digest()));
        params.push(format!("uri=\"{}\"", uri.quote_for_digest()));
        params.push(format!("nonce=\"{}\"", self.nonce.quote_for_digest()));

        {
            let mut counter = self.lock_counter();
            let response = self.response_locked(&mut counter, method, uri);
            params.push(format!("response=\"{}\"", response));
            if let Some(qop) = self.qop {
                params.push(format!("nc={:08}", counter.nc));
                params.push(format!("cnonce=\"{}\"", counter.cnonce.quote_for_digest()));
                params.push(format!("qop=\"{}\"", qop));
            }
        }

        if !self.opaque.is_empty() {
            params.push(format!("opaque=\"{}\"", self.opaque.quote_for_digest()));
        }

        Some(format!("Digest {}", params.join(", ")))
    }

    /// Set the `Authorization` header on a request, using its method and
    /// path (plus query). Does nothing if no challenge has been parsed yet.
    pub fn set_auth_header<B>(&self, request: &mut http::Request<B>) -> Result<()> {
        let mut uri = request.uri().path().to_string();
        if let Some(query) = request.uri().query().filter(|q| !q.is_empty()) {
            uri.push('?');
            uri.push_str(query);
        }

        let value = match self.authorization_for(request.method().as_str(), &uri) {
            Some(v) => v,
            None => {
                log::trace!("no digest challenge yet, {} {} sent without credentials", request.method(), uri);
                return Ok(());
            }
        };

        let value = http::HeaderValue::from_str(&value)?;
        request.headers_mut().insert(http::header::AUTHORIZATION, value);
        Ok(())
    }

    fn lock_counter(&self) -> MutexGuard<'_, NonceCounter> {
        self.counter.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authorizer")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("realm", &self.realm)
            .field("nonce", &self.nonce)
            .field("opaque", &self.opaque)
            .field("qop", &self.qop)
            .field("algorithm", &self.algorithm)
            .field("ready", &self.ready)
            .field("nc", &self.nonce_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Authorizer, NC_MAX};
    use crate::{Error, Qop};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    const RFC2617_CHALLENGE: &str = r#"Digest realm="testrealm@host.com", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;

    fn rfc2617_setup() -> Authorizer {
        let mut a = Authorizer::new();
        a.parse_challenge(RFC2617_CHALLENGE).unwrap();
        a.user("Mufasa").pass("Circle Of Life");
        a
    }

    #[test]
    fn test_not_ready_until_challenge() {
        let mut a = Authorizer::new();
        a.user("Mufasa").pass("Circle Of Life").method("GET").uri("/dir/index.html");
        assert!(!a.auth_ready());
        assert_eq!(a.authorization(), None);

        a.parse_challenge(RFC2617_CHALLENGE).unwrap();
        assert!(a.auth_ready());
        assert_eq!(a.qop(), Some(Qop::AUTH));
        assert_eq!(a.realm(), "testrealm@host.com");
        assert_eq!(a.opaque(), Some("5ccc069c403ebaf9f0171e9517f40e41"));
        assert!(a.authorization().is_some());

        a.reauth();
        assert!(!a.auth_ready());
        assert_eq!(a.authorization(), None);
    }

    #[test]
    fn test_rejected_challenge_leaves_not_ready() {
        let mut a = rfc2617_setup();
        assert!(a.auth_ready());

        let err = a
            .parse_challenge(r#"realm="other", qop="auth-int", nonce="abc12345""#)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedQop(_)));
        assert!(!a.auth_ready());
        // nothing of the rejected challenge was applied
        assert_eq!(a.realm(), "testrealm@host.com");

        let err = a
            .parse_challenge(r#"realm="other", algorithm=SHA1, nonce="abc12345""#)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedAlgorithm(_)));
        assert!(!a.auth_ready());
    }

    #[test]
    fn test_rfc2617() {
        let mut a = rfc2617_setup();
        a.pin_cnonce(1, "0a4f113b");

        assert_eq!(a.a1(), "Mufasa:testrealm@host.com:Circle Of Life");
        assert_eq!(a.a2("GET", "/dir/index.html"), "GET:/dir/index.html");
        assert_eq!(
            a.response("GET", "/dir/index.html"),
            "6629fae49393a05397450978507c4ef1"
        );
        // pinned: repeatable
        assert_eq!(
            a.response("GET", "/dir/index.html"),
            "6629fae49393a05397450978507c4ef1"
        );
        assert_eq!(a.nonce_count(), 1);
    }

    #[test]
    fn test_rfc2069() {
        let mut a = Authorizer::new();
        a.parse_challenge(r#"Digest realm="testrealm@host.com", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#)
            .unwrap();
        a.user("Mufasa").pass("CircleOfLife");

        // RFC 2069 prints a wrong hash in its example, see errata
        assert_eq!(
            a.authorization_for("GET", "/dir/index.html").unwrap(),
            r#"Digest username="Mufasa", realm="testrealm@host.com", uri="/dir/index.html", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", response="1949323746fe6a43ef61f9606e7febea", opaque="5ccc069c403ebaf9f0171e9517f40e41""#
        );
        // no qop, no counter
        assert_eq!(a.nonce_count(), 0);
    }

    #[test]
    fn test_rfc7616_md5() {
        let mut a = Authorizer::new();
        a.parse_challenge(
            r#"Digest
               realm="http-auth@example.org",
               qop="auth, auth-int",
               algorithm=MD5,
               nonce="7ypf/xlj9XXwfDPEoM4URrv/xwf94BcCAzFZH4GiTo0v",
               opaque="FQhe/qaU925kfnzjCev0ciny7QMkPqMAFRtzCUYo5tdS""#,
        )
        .unwrap();
        a.user("Mufasa").pass("Circle of Life");

        a.pin_cnonce(1, "f2/wE4q74E6zIJEtWaHKaf5wv/H5QzzpXusqGemxURZJ");
        assert_eq!(
            a.response("GET", "/dir/index.html"),
            "8ca523f5e9506fed4657c9700eebdbec"
        );

        a.pin_cnonce(2, "f2/wE4q74E6zIJEtWaHKaf5wv/H5QzzpXusqGemxURZJ");
        assert_eq!(
            a.response("GET", "/dir/index.html"),
            "4b5d595ecf2db9df612ea5b45cd97101"
        );
    }

    #[test]
    fn test_header_rfc2617() {
        let mut a = rfc2617_setup();
        a.pin_cnonce(1, "0a4f113b").method("GET").uri("/dir/index.html");

        let str = a.authorization().unwrap().replace(", ", ",\n  ");
        assert_eq!(
            str,
            r#"
Digest username="Mufasa",
  realm="testrealm@host.com",
  uri="/dir/index.html",
  nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093",
  response="6629fae49393a05397450978507c4ef1",
  nc=00000001,
  cnonce="0a4f113b",
  qop="auth",
  opaque="5ccc069c403ebaf9f0171e9517f40e41"
"#
            .trim()
        );
    }

    #[test]
    fn test_header_without_opaque() {
        let mut a = Authorizer::new();
        a.parse_challenge(r#"realm="r", qop=auth, nonce="n""#).unwrap();
        a.user(r#"quote"d"#).pass("p");

        let header = a.authorization_for("GET", "/").unwrap();
        assert!(header.starts_with(r#"Digest username="quote\"d", realm="r", uri="/", nonce="n", response=""#));
        assert!(header.contains(", nc=00000001, cnonce=\""));
        assert!(header.ends_with(r#", qop="auth""#));
        assert!(!header.contains("opaque"));
    }

    #[test]
    fn test_replay() {
        let a = rfc2617_setup();

        let r1 = a.response("GET", "/dir/index.html");
        let c1 = a.cnonce();
        let r2 = a.response("GET", "/dir/index.html");
        let c2 = a.cnonce();

        assert_ne!(r1, r2);
        assert_ne!(c1, c2);
        assert_eq!(c1.len(), 16);
        assert!(c1.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a.nonce_count(), 2);
    }

    #[test]
    fn test_nc_stays_eight_digits() {
        let mut a = rfc2617_setup();
        a.counter.get_mut().unwrap().nc = NC_MAX - 1;

        let header = a.authorization_for("GET", "/").unwrap();
        assert!(header.contains(", nc=99999999, "));
        assert_eq!(a.nonce_count(), NC_MAX);

        let header = a.authorization_for("GET", "/").unwrap();
        assert!(header.contains(", nc=00000001, "));
        assert_eq!(a.nonce_count(), 1);
    }

    #[test]
    fn test_injected_rng_is_deterministic() {
        let make = || {
            let mut a = Authorizer::with_rng(Box::new(StdRng::seed_from_u64(7)));
            a.parse_challenge(RFC2617_CHALLENGE).unwrap();
            a.user("Mufasa").pass("Circle Of Life");
            a
        };

        let a = make();
        let b = make();
        assert_eq!(a.response("GET", "/"), b.response("GET", "/"));
        assert_eq!(a.cnonce(), b.cnonce());
    }

    #[test]
    fn test_nc_survives_rechallenge() {
        let mut a = rfc2617_setup();
        a.response("GET", "/");
        a.response("GET", "/");

        a.parse_challenge(r#"realm="testrealm@host.com", qop="auth", nonce="fresh", stale=true"#)
            .unwrap();
        assert_eq!(a.nonce(), "fresh");
        assert_eq!(a.opaque(), None);
        assert_eq!(a.nonce_count(), 2);

        a.response("GET", "/");
        assert_eq!(a.nonce_count(), 3);
    }

    #[test]
    fn test_concurrent_responses() {
        let a = Arc::new(rfc2617_setup());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let a = Arc::clone(&a);
                thread::spawn(move || {
                    (0..25)
                        .map(|_| a.authorization_for("GET", "/dir/index.html").unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts = HashSet::new();
        for h in handles {
            for header in h.join().unwrap() {
                let nc = header
                    .split(", ")
                    .find(|p| p.starts_with("nc="))
                    .unwrap()
                    .to_string();
                assert!(counts.insert(nc), "nonce count reused");
            }
        }

        assert_eq!(counts.len(), 200);
        assert_eq!(a.nonce_count(), 200);
    }

    #[test]
    fn test_set_auth_header() {
        let mut a = Authorizer::new();
        let mut req = http::Request::get("http://example.com/dir/index.html?x=1&y=2")
            .body(())
            .unwrap();

        a.set_auth_header(&mut req).unwrap();
        assert!(req.headers().get(http::header::AUTHORIZATION).is_none());

        a.parse_challenge(RFC2617_CHALLENGE).unwrap();
        a.user("Mufasa").pass("Circle Of Life");
        a.set_auth_header(&mut req).unwrap();

        let value = req.headers()[http::header::AUTHORIZATION].to_str().unwrap();
        assert!(value.contains(r#"uri="/dir/index.html?x=1&y=2""#));
        assert!(value.contains("nc=00000001"));

        let mut bad = http::Request::get("/").body(()).unwrap();
        a.user("line\nbreak");
        assert!(matches!(a.set_auth_header(&mut bad), Err(Error::InvalidHeaderValue(_))));
    }
}
