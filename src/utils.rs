/// Backslash quoting for values rendered inside a quoted-string
pub trait QuoteForDigest {
    fn quote_for_digest(&self) -> String;
}

impl QuoteForDigest for str {
    fn quote_for_digest(&self) -> String {
        let mut quoted = String::with_capacity(self.len());
        for c in self.chars() {
            if c == '\\' || c == '"' {
                quoted.push('\\');
            }
            quoted.push(c);
        }
        quoted
    }
}
