use crate::{Authorizer, Error, Result};

use http::header::{HeaderValue, CONTENT_LENGTH, WWW_AUTHENTICATE};
use http::{Request, Response, StatusCode};

/// Something that can execute a blocking HTTP request.
///
/// Timeouts, retries and connection reuse are the transport's business.
pub trait Transport {
    /// Body type of both requests and responses. The default value is the empty body.
    type Body: Default;
    type Error: std::error::Error + Send + Sync + 'static;

    fn execute(
        &mut self,
        request: Request<Self::Body>,
    ) -> std::result::Result<Response<Self::Body>, Self::Error>;
}

/// HTTP client doing Digest authentication on top of a [`Transport`](trait.Transport.html).
///
/// While the authorizer has no challenge, every request is preceded by an
/// empty probe with the same method, URI and headers, so credentials are never
/// sent to a realm we know nothing about. A 401 on the real request re-primes
/// the authorizer for the next call; the 401 itself is returned as is.
#[derive(Debug)]
pub struct DigestClient<T> {
    transport: T,
    authorizer: Authorizer,
}

impl<T: Transport> DigestClient<T> {
    pub fn new(transport: T, authorizer: Authorizer) -> Self {
        DigestClient {
            transport,
            authorizer,
        }
    }

    pub fn authorizer(&self) -> &Authorizer {
        &self.authorizer
    }

    pub fn authorizer_mut(&mut self) -> &mut Authorizer {
        &mut self.authorizer
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_parts(self) -> (T, Authorizer) {
        (self.transport, self.authorizer)
    }

    /// Send a request, probing for a challenge first if we don't have one.
    ///
    /// # Errors
    /// Transport failures from either the probe or the request, and an
    /// unusable challenge on the probe. An unusable challenge on the request
    /// itself is logged; the 401 is still returned and the next call probes again.
    pub fn send(&mut self, mut request: Request<T::Body>) -> Result<Response<T::Body>> {
        if !self.authorizer.auth_ready() {
            self.probe(&request)?;
        }

        self.authorizer.set_auth_header(&mut request)?;
        let method = request.method().clone();
        let uri = request.uri().clone();

        let response = self.transport.execute(request).map_err(Error::transport)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            log::warn!("{} {} answered 401, taking the new challenge", method, uri);
            if let Err(e) = self.ingest_challenge(&response) {
                log::warn!("unusable challenge from {} {}: {}", method, uri, e);
            }
        }

        Ok(response)
    }

    /// Send a bodiless copy of the request to pick up the server's challenge
    fn probe(&mut self, request: &Request<T::Body>) -> Result<()> {
        let mut probe = Request::new(T::Body::default());
        *probe.method_mut() = request.method().clone();
        *probe.uri_mut() = request.uri().clone();
        *probe.version_mut() = request.version();
        *probe.headers_mut() = request.headers().clone();
        probe
            .headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
        self.authorizer.set_auth_header(&mut probe)?;

        log::debug!("probing {} {} for a digest challenge", probe.method(), probe.uri());
        let response = self.transport.execute(probe).map_err(Error::transport)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.ingest_challenge(&response)?;
        }
        Ok(())
    }

    fn ingest_challenge(&mut self, response: &Response<T::Body>) -> Result<()> {
        let challenge = match response.headers().get(WWW_AUTHENTICATE) {
            Some(value) => match value.to_str() {
                Ok(v) => v,
                Err(e) => {
                    self.authorizer.reauth();
                    return Err(e.into());
                }
            },
            None => {
                log::warn!("401 without a WWW-Authenticate header");
                ""
            }
        };
        self.authorizer.parse_challenge(challenge)
    }
}
