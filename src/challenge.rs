use crate::{Algorithm, Error, Qop, Result};
use std::collections::HashMap;
use std::str::FromStr;

/// WWW-Authenticate challenge parsed from HTTP header value
#[derive(Debug, PartialEq, Clone)]
pub struct Challenge {
    /// Authorization realm (i.e. hostname, serial number...)
    pub realm: String,
    /// Server nonce
    pub nonce: String,
    /// Server opaque string, echoed back verbatim. None if absent or empty.
    pub opaque: Option<String>,
    /// Negotiated quality of protection. None in legacy mode (RFC 2069).
    pub qop: Option<Qop>,
    /// Hashing algo
    pub algorithm: Algorithm,
    /// True if the server says our nonce expired rather than the credentials being wrong
    pub stale: bool,
}

impl Challenge {
    /// Construct from the `WWW-Authenticate` header string.
    ///
    /// Tokens without a `key=value` shape (including the leading `Digest`
    /// scheme word) are skipped. Missing `realm` or `nonce` leave the fields empty.
    ///
    /// # Errors
    /// `UnsupportedQop` if the offered qop list has no `auth` entry but some other
    /// non-empty entry, `UnsupportedAlgorithm` for any algorithm but `MD5`.
    pub fn parse(input: &str) -> Result<Self> {
        let mut kv = parse_header_map(input);

        let qop = select_qop(kv.get("qop").map(String::as_str).unwrap_or(""))?;

        let algorithm = match kv.get("algorithm") {
            Some(a) => Algorithm::from_str(a)?,
            None => Algorithm::default(),
        };

        Ok(Self {
            realm: kv.remove("realm").unwrap_or_default(),
            nonce: kv.remove("nonce").unwrap_or_default(),
            opaque: kv.remove("opaque").filter(|o| !o.is_empty()),
            qop,
            algorithm,
            stale: match kv.get("stale") {
                Some(v) => v.eq_ignore_ascii_case("true"),
                None => false,
            },
        })
    }
}

impl FromStr for Challenge {
    type Err = Error;

    /// Parse HTTP header
    fn from_str(input: &str) -> Result<Self> {
        Self::parse(input)
    }
}

/// Pick `auth` if it is offered anywhere in the list, otherwise the first
/// non-empty entry, which must then be rejected.
fn select_qop(offered: &str) -> Result<Option<Qop>> {
    let mut selected = None;
    for q in offered.split(',').map(str::trim).filter(|q| !q.is_empty()) {
        if q == "auth" {
            selected = Some(q);
            break;
        }
        if selected.is_none() {
            selected = Some(q);
        }
    }

    selected.map(Qop::from_str).transpose()
}

/// Helper func that parses the key-value string received from server.
///
/// Later duplicates of a key win.
pub fn parse_header_map(input: &str) -> HashMap<String, String> {
    let mut parsed = HashMap::new();
    for token in Tokenizer::new(input) {
        match token {
            Ok((key, value)) => {
                parsed.insert(key, value);
            }
            Err(e) => log::trace!("skipping challenge token: {}", e),
        }
    }
    parsed
}

/// Scanner over whitespace/comma separated `key=value` and `key="value"` tokens
struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Tokenizer { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_separators(&mut self) {
        while let Some(c) = self.peek() {
            if !is_separator(c) {
                break;
            }
            self.bump();
        }
    }

    /// Consume up to (not including) the next separator or `=`
    fn take_word(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_separator(c) || c == '=' {
                break;
            }
            self.bump();
        }
        &self.input[start..self.pos]
    }

    /// Consume a quoted-string body; the opening quote is already consumed.
    /// An unterminated string runs to the end of input.
    fn take_quoted(&mut self) -> String {
        let mut value = String::new();
        while let Some(c) = self.bump() {
            match c {
                '"' => break,
                '\\' => {
                    if let Some(next) = self.bump() {
                        value.push(next);
                    }
                }
                _ => value.push(c),
            }
        }
        value
    }

    fn take_plain(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_separator(c) {
                break;
            }
            self.bump();
        }
        &self.input[start..self.pos]
    }

    /// Unquoted comma list such as `qop=auth-int, auth`. Items run on as long
    /// as the text after a comma is not the next `key=`.
    fn take_plain_list(&mut self) -> &'a str {
        let start = self.pos;
        self.take_plain();
        loop {
            let end = self.pos;
            if self.peek() != Some(',') {
                break;
            }
            self.skip_separators();
            let item = self.take_word();
            if item.is_empty() || self.peek() == Some('=') {
                self.pos = end;
                break;
            }
        }
        &self.input[start..self.pos]
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<(String, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_separators();
        self.peek()?;

        let key = self.take_word();
        if self.peek() != Some('=') {
            return Some(Err(Error::MalformedToken(key.to_string())));
        }
        self.bump();

        let value = if self.peek() == Some('"') {
            self.bump();
            self.take_quoted()
        } else if key == "qop" {
            self.take_plain_list().to_string()
        } else {
            self.take_plain().to_string()
        };

        if key.is_empty() {
            return Some(Err(Error::MalformedToken(format!("={}", value))));
        }

        Some(Ok((key.to_string(), value)))
    }
}

fn is_separator(c: char) -> bool {
    c == ',' || c.is_whitespace()
}
