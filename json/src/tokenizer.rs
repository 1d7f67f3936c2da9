use crate::error::{JsonError, JsonResult};

/// Events emitted while scanning a JSON document. Object keys are reported via
/// `Key` immediately before the value event that follows them; array/object
/// elements otherwise carry no key event.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
  StartObj,
  EndObj,
  StartArr,
  EndArr,
  Key(String),
  Str(String),
  Num(String),
  Bool(bool),
  Null,
}

struct Scanner<'a> {
  buf: &'a [u8],
  pos: usize,
}

/// Scans exactly one top-level JSON value out of `buf`, returning the token
/// stream and the number of bytes consumed. Returns `JsonError::Incomplete` if
/// `buf` does not yet hold a whole value (e.g. a socket read split a string or
/// closed an object early); the caller is expected to keep the unconsumed tail
/// and append more bytes before retrying, matching the net layer's read-buffer
/// contract.
pub fn tokenize(buf: &[u8]) -> JsonResult<(Vec<Token>, usize)> {
  let mut s = Scanner { buf, pos: 0 };
  let mut out = Vec::new();
  s.skip_ws();
  s.scan_value(&mut out)?;
  s.skip_ws();
  Ok((out, s.pos))
}

impl<'a> Scanner<'a> {
  fn peek(&self) -> JsonResult<u8> {
    self.buf.get(self.pos).copied().ok_or(JsonError::Incomplete)
  }

  fn bump(&mut self) -> JsonResult<u8> {
    let b = self.peek()?;
    self.pos += 1;
    Ok(b)
  }

  fn skip_ws(&mut self) {
    while let Some(&b) = self.buf.get(self.pos) {
      if b == b' ' || b == b'\t' || b == b'\n' || b == b'\r' {
        self.pos += 1;
      } else {
        break;
      }
    }
  }

  fn expect(&mut self, b: u8) -> JsonResult<()> {
    if self.bump()? == b {
      Ok(())
    } else {
      Err(JsonError::Invalid(format!("expected '{}'", b as char)))
    }
  }

  fn expect_literal(&mut self, lit: &str) -> JsonResult<()> {
    for b in lit.bytes() {
      self.expect(b)?;
    }
    Ok(())
  }

  fn scan_value(&mut self, out: &mut Vec<Token>) -> JsonResult<()> {
    self.skip_ws();
    match self.peek()? {
      b'{' => self.scan_object(out),
      b'[' => self.scan_array(out),
      b'"' => {
        let s = self.scan_string()?;
        out.push(Token::Str(s));
        Ok(())
      }
      b't' => {
        self.expect_literal("true")?;
        out.push(Token::Bool(true));
        Ok(())
      }
      b'f' => {
        self.expect_literal("false")?;
        out.push(Token::Bool(false));
        Ok(())
      }
      b'n' => {
        self.expect_literal("null")?;
        out.push(Token::Null);
        Ok(())
      }
      b'-' | b'0'..=b'9' => {
        let n = self.scan_number()?;
        out.push(Token::Num(n));
        Ok(())
      }
      other => Err(JsonError::Invalid(format!("unexpected byte 0x{:02x}", other))),
    }
  }

  fn scan_object(&mut self, out: &mut Vec<Token>) -> JsonResult<()> {
    self.expect(b'{')?;
    out.push(Token::StartObj);
    self.skip_ws();
    if self.peek()? == b'}' {
      self.pos += 1;
      out.push(Token::EndObj);
      return Ok(());
    }
    loop {
      self.skip_ws();
      if self.peek()? != b'"' {
        return Err(JsonError::Invalid("expected object key".into()));
      }
      let key = self.scan_string()?;
      out.push(Token::Key(key));
      self.skip_ws();
      self.expect(b':')?;
      self.scan_value(out)?;
      self.skip_ws();
      match self.bump()? {
        b',' => continue,
        b'}' => {
          out.push(Token::EndObj);
          return Ok(());
        }
        _ => return Err(JsonError::Invalid("expected ',' or '}'".into())),
      }
    }
  }

  fn scan_array(&mut self, out: &mut Vec<Token>) -> JsonResult<()> {
    self.expect(b'[')?;
    out.push(Token::StartArr);
    self.skip_ws();
    if self.peek()? == b']' {
      self.pos += 1;
      out.push(Token::EndArr);
      return Ok(());
    }
    loop {
      self.scan_value(out)?;
      self.skip_ws();
      match self.bump()? {
        b',' => continue,
        b']' => {
          out.push(Token::EndArr);
          return Ok(());
        }
        _ => return Err(JsonError::Invalid("expected ',' or ']'".into())),
      }
    }
  }

  fn scan_string(&mut self) -> JsonResult<String> {
    self.expect(b'"')?;
    let mut s = String::new();
    loop {
      let b = self.bump()?;
      match b {
        b'"' => return Ok(s),
        b'\\' => {
          let esc = self.bump()?;
          match esc {
            b'"' => s.push('"'),
            b'\\' => s.push('\\'),
            b'/' => s.push('/'),
            b'b' => s.push('\u{8}'),
            b'f' => s.push('\u{c}'),
            b'n' => s.push('\n'),
            b'r' => s.push('\r'),
            b't' => s.push('\t'),
            b'u' => {
              let mut code = 0u32;
              for _ in 0..4 {
                let h = self.bump()?;
                let d = (h as char)
                  .to_digit(16)
                  .ok_or_else(|| JsonError::Invalid("bad \\u escape".into()))?;
                code = code * 16 + d;
              }
              s.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            _ => return Err(JsonError::Invalid("bad escape sequence".into())),
          }
        }
        _ => {
          // re-decode as utf8 a byte at a time is wrong for multi-byte sequences;
          // fall back to scanning the remaining buffer as utf8 up to the next
          // unescaped quote/backslash.
          let start = self.pos - 1;
          let mut end = self.pos;
          while end < self.buf.len() && self.buf[end] != b'"' && self.buf[end] != b'\\' {
            end += 1;
          }
          let chunk = std::str::from_utf8(&self.buf[start..end])
            .map_err(|_| JsonError::Invalid("invalid utf8 in string".into()))?;
          s.push_str(chunk);
          self.pos = end;
        }
      }
    }
  }

  fn scan_number(&mut self) -> JsonResult<String> {
    let start = self.pos;
    if self.peek()? == b'-' {
      self.pos += 1;
    }
    while matches!(self.buf.get(self.pos), Some(b'0'..=b'9')) {
      self.pos += 1;
    }
    if matches!(self.buf.get(self.pos), Some(b'.')) {
      self.pos += 1;
      while matches!(self.buf.get(self.pos), Some(b'0'..=b'9')) {
        self.pos += 1;
      }
    }
    if matches!(self.buf.get(self.pos), Some(b'e') | Some(b'E')) {
      self.pos += 1;
      if matches!(self.buf.get(self.pos), Some(b'+') | Some(b'-')) {
        self.pos += 1;
      }
      while matches!(self.buf.get(self.pos), Some(b'0'..=b'9')) {
        self.pos += 1;
      }
    }
    if self.pos == start {
      return Err(JsonError::Incomplete);
    }
    // a number never needs to be terminated by a delimiter we haven't seen yet;
    // if we ran off the end of the buffer while still in digits, treat as
    // incomplete since a later byte could still extend the exponent/fraction.
    if self.pos == self.buf.len() {
      return Err(JsonError::Incomplete);
    }
    Ok(String::from_utf8_lossy(&self.buf[start..self.pos]).into_owned())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn scans_flat_object() {
    let (toks, consumed) = tokenize(br#"{"a":1,"b":true}"#).unwrap();
    assert_eq!(consumed, 16);
    assert_eq!(
      toks,
      vec![
        Token::StartObj,
        Token::Key("a".into()),
        Token::Num("1".into()),
        Token::Key("b".into()),
        Token::Bool(true),
        Token::EndObj,
      ]
    );
  }

  #[test]
  fn incomplete_object_is_incomplete() {
    let err = tokenize(br#"{"a":1"#).unwrap_err();
    assert_eq!(err, JsonError::Incomplete);
  }

  #[test]
  fn nested_array_of_objects() {
    let (toks, _) = tokenize(br#"[{"id":1},{"id":2}]"#).unwrap();
    assert_eq!(toks[0], Token::StartArr);
    assert_eq!(toks.last().unwrap(), &Token::EndArr);
  }

  #[test]
  fn escaped_string() {
    let (toks, _) = tokenize(br#""line1\nline2""#).unwrap();
    assert_eq!(toks, vec![Token::Str("line1\nline2".into())]);
  }

  #[test]
  fn leftover_bytes_are_not_consumed() {
    let (_, consumed) = tokenize(b"1 garbage").unwrap();
    // trailing bytes after the scalar are left for the caller to deal with
    assert_eq!(consumed, 1);
  }
}
