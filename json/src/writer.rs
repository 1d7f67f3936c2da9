/// Incremental JSON writer over a growable byte buffer.
///
/// Tracks an implicit stack of open object/array scopes so callers can emit a
/// document depth-first without building an intermediate tree. A flushed
/// writer's `into_bytes()` is handed to the net layer's write queue, which is
/// where buffer chaining actually happens; this writer itself only grows one
/// contiguous `Vec<u8>`.
#[derive(Debug, Default)]
pub struct JsonWriter {
  buf: Vec<u8>,
  scopes: Vec<Scope>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
  Object { wrote_member: bool },
  Array { wrote_elem: bool },
}

impl JsonWriter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.buf
  }

  pub fn into_bytes(self) -> Vec<u8> {
    self.buf
  }

  fn before_value(&mut self) {
    match self.scopes.last_mut() {
      Some(Scope::Array { wrote_elem }) => {
        if *wrote_elem {
          self.buf.push(b',');
        }
        *wrote_elem = true;
      }
      _ => {}
    }
  }

  pub fn start_obj(&mut self) -> &mut Self {
    self.before_value();
    self.buf.push(b'{');
    self.scopes.push(Scope::Object { wrote_member: false });
    self
  }

  pub fn end_obj(&mut self) -> &mut Self {
    self.buf.push(b'}');
    self.scopes.pop();
    self
  }

  pub fn start_arr(&mut self) -> &mut Self {
    self.before_value();
    self.buf.push(b'[');
    self.scopes.push(Scope::Array { wrote_elem: false });
    self
  }

  pub fn end_arr(&mut self) -> &mut Self {
    self.buf.push(b']');
    self.scopes.pop();
    self
  }

  pub fn key(&mut self, k: &str) -> &mut Self {
    if let Some(Scope::Object { wrote_member }) = self.scopes.last_mut() {
      if *wrote_member {
        self.buf.push(b',');
      }
      *wrote_member = true;
    }
    write_escaped_str(&mut self.buf, k);
    self.buf.push(b':');
    self
  }

  pub fn str(&mut self, s: &str) -> &mut Self {
    self.before_value();
    write_escaped_str(&mut self.buf, s);
    self
  }

  pub fn num(&mut self, n: impl std::fmt::Display) -> &mut Self {
    self.before_value();
    use std::io::Write;
    write!(&mut self.buf, "{}", n).expect("writing to Vec<u8> cannot fail");
    self
  }

  pub fn boolean(&mut self, b: bool) -> &mut Self {
    self.before_value();
    self.buf.extend_from_slice(if b { b"true" } else { b"false" });
    self
  }

  pub fn null(&mut self) -> &mut Self {
    self.before_value();
    self.buf.extend_from_slice(b"null");
    self
  }

  pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
    self.before_value();
    self.buf.extend_from_slice(bytes);
    self
  }
}

fn write_escaped_str(buf: &mut Vec<u8>, s: &str) {
  buf.push(b'"');
  for c in s.chars() {
    match c {
      '"' => buf.extend_from_slice(b"\\\""),
      '\\' => buf.extend_from_slice(b"\\\\"),
      '\n' => buf.extend_from_slice(b"\\n"),
      '\r' => buf.extend_from_slice(b"\\r"),
      '\t' => buf.extend_from_slice(b"\\t"),
      c if (c as u32) < 0x20 => {
        use std::io::Write;
        write!(buf, "\\u{:04x}", c as u32).expect("writing to Vec<u8> cannot fail");
      }
      c => {
        let mut tmp = [0u8; 4];
        buf.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
      }
    }
  }
  buf.push(b'"');
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn writes_flat_object() {
    let mut w = JsonWriter::new();
    w.start_obj().key("jsonrpc").str("2.0").key("id").num(1).end_obj();
    assert_eq!(
      String::from_utf8(w.into_bytes()).unwrap(),
      r#"{"jsonrpc":"2.0","id":1}"#
    );
  }

  #[test]
  fn writes_nested_array_params() {
    let mut w = JsonWriter::new();
    w.start_obj()
      .key("method")
      .str("accountSubscribe")
      .key("params")
      .start_arr()
      .str("pubkey")
      .start_obj()
      .key("encoding")
      .str("base64")
      .end_obj()
      .end_arr()
      .end_obj();
    assert_eq!(
      String::from_utf8(w.into_bytes()).unwrap(),
      r#"{"method":"accountSubscribe","params":["pubkey",{"encoding":"base64"}]}"#
    );
  }

  #[test]
  fn escapes_control_characters() {
    let mut w = JsonWriter::new();
    w.str("a\nb\"c");
    assert_eq!(String::from_utf8(w.into_bytes()).unwrap(), r#""a\nb\"c""#);
  }
}
