use std::borrow::Cow;

/// Minimal CSV writer for the audit files and ticket transcripts the bot
/// attaches to log messages.
pub struct CsvBuilder {
    buf: String,
}

impl CsvBuilder {
    pub fn new(headers: &[&str]) -> Self {
        let mut builder = Self { buf: String::new() };
        builder.row(headers);
        builder
    }

    pub fn row(&mut self, fields: &[&str]) {
        let mut first = true;
        for field in fields {
            if !first {
                self.buf.push(',');
            }
            first = false;
            self.buf.push_str(&escape(field));
        }
        self.buf.push('\n');
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.into_bytes()
    }
}

fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fields_pass_through() {
        assert_eq!(escape("hello"), "hello");
        assert_eq!(escape(""), "");
    }

    #[test]
    fn separators_and_quotes_are_escaped() {
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn builder_produces_header_and_rows() {
        let mut csv = CsvBuilder::new(&["user", "reason"]);
        csv.row(&["someone", "left, then returned"]);

        let text = String::from_utf8(csv.into_bytes()).unwrap();
        assert_eq!(text, "user,reason\nsomeone,\"left, then returned\"\n");
    }
}
