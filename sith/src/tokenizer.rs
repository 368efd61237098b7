use super::errors::{ErrorKind, Result};
use failchain::bail;
use log::trace;

/// Lexer shared by the level and model text formats.
///
/// Tokens are slices of the borrowed text, so they stay valid while the
/// tokenizer keeps advancing.
pub struct Tokenizer<'a> {
    file: &'a str,
    text: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(file: &'a str, text: &'a str) -> Self {
        Tokenizer { file, text, pos: 0 }
    }

    pub fn file(&self) -> &'a str {
        self.file
    }

    /// 1-based line of the current position.
    pub fn line(&self) -> usize {
        self.text.as_bytes()[..self.pos]
            .iter()
            .filter(|&&byte| byte == b'\n')
            .count()
            + 1
    }

    pub fn next_token(&mut self) -> Option<&'a str> {
        self.skip_blank();
        let bytes = self.text.as_bytes();
        let start = self.pos;
        let first = *bytes.get(start)?;

        if first == b'"' {
            let content_start = start + 1;
            let content_end = bytes[content_start..]
                .iter()
                .position(|&byte| byte == b'"')
                .map_or(bytes.len(), |offset| content_start + offset);
            self.pos = (content_end + 1).min(bytes.len());
            return Some(&self.text[content_start..content_end]);
        }

        if is_punctuation(first) {
            self.pos = start + 1;
            return Some(&self.text[start..self.pos]);
        }

        let end = bytes[start..]
            .iter()
            .position(|&byte| byte.is_ascii_whitespace() || is_punctuation(byte))
            .map_or(bytes.len(), |offset| start + offset);
        self.pos = end;
        Some(&self.text[start..end])
    }

    pub fn peek_token(&mut self) -> Option<&'a str> {
        let pos = self.pos;
        let token = self.next_token();
        self.pos = pos;
        token
    }

    /// Next token, skipping one `:` separator if present.
    pub fn next_word(&mut self, expected: &str) -> Result<&'a str> {
        let token = self.required_token(expected)?;
        if token == ":" {
            self.required_token(expected)
        } else {
            Ok(token)
        }
    }

    pub fn next_int(&mut self) -> Result<i32> {
        let token = self.next_word("integer")?;
        Ok(token.parse().unwrap_or_else(|_| {
            trace!("{}:{}: `{}` is not an integer", self.file, self.line(), token);
            0
        }))
    }

    pub fn next_float(&mut self) -> Result<f32> {
        let token = self.next_word("number")?;
        Ok(token.parse().unwrap_or_else(|_| {
            trace!("{}:{}: `{}` is not a number", self.file, self.line(), token);
            0.0
        }))
    }

    /// Record count of a section. Negative counts are malformed.
    pub fn next_count(&mut self, section: &str) -> Result<usize> {
        let count = self.next_int()?;
        if count < 0 {
            bail!(ErrorKind::bad_count(self.file, self.line(), section, count));
        }
        Ok(count as usize)
    }

    /// Polygon corner written as `vertex` or `vertex,texture_vertex`. A missing
    /// texture vertex reads as 0.
    pub fn next_corner(&mut self) -> Result<(i32, i32)> {
        let vertex = self.next_int()?;
        if self.peek_token() == Some(",") {
            self.next_token();
            Ok((vertex, self.next_int()?))
        } else {
            Ok((vertex, 0))
        }
    }

    /// Flag fields, written as `0x`-prefixed hexadecimal.
    pub fn next_hex(&mut self) -> Result<u32> {
        let token = self.next_word("flags")?;
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        Ok(u32::from_str_radix(digits, 16).unwrap_or_else(|_| {
            trace!("{}:{}: `{}` is not hexadecimal", self.file, self.line(), token);
            0
        }))
    }

    /// Consumes the next token, failing unless it is `keyword` (ignoring case).
    pub fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        let token = self.required_token(keyword)?;
        if !token.eq_ignore_ascii_case(keyword) {
            bail!(ErrorKind::expected_keyword(
                self.file,
                self.line(),
                keyword,
                token
            ));
        }
        Ok(())
    }

    /// Whether the next token is `keyword` (ignoring case), without consuming it.
    pub fn peek_is(&mut self, keyword: &str) -> bool {
        self.peek_token()
            .map_or(false, |token| token.eq_ignore_ascii_case(keyword))
    }

    /// Raw text up to the end of the current line, trimmed. Consumes the line
    /// terminator.
    pub fn rest_of_line(&mut self) -> &'a str {
        let rest = &self.text[self.pos..];
        match rest.find('\n') {
            Some(offset) => {
                self.pos += offset + 1;
                rest[..offset].trim()
            }
            None => {
                self.pos = self.text.len();
                rest.trim()
            }
        }
    }

    pub fn is_at_end(&mut self) -> bool {
        self.peek_token().is_none()
    }

    fn required_token(&mut self, expected: &str) -> Result<&'a str> {
        match self.next_token() {
            Some(token) => Ok(token),
            None => Err(ErrorKind::unexpected_end(self.file, self.line(), expected).into()),
        }
    }

    fn skip_blank(&mut self) {
        let bytes = self.text.as_bytes();
        while let Some(&byte) = bytes.get(self.pos) {
            if byte.is_ascii_whitespace() {
                self.pos += 1;
            } else if byte == b'#' {
                self.pos = bytes[self.pos..]
                    .iter()
                    .position(|&byte| byte == b'\n')
                    .map_or(bytes.len(), |offset| self.pos + offset);
            } else {
                break;
            }
        }
    }
}

fn is_punctuation(byte: u8) -> bool {
    byte == b':' || byte == b','
}
