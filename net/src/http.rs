use crate::error::NetResult;

/// Thin `reqwest`-based JSON-RPC POST helper. Owns one client so connections
/// are pooled across repeated calls to the same RPC host.
#[derive(Debug, Clone)]
pub struct HttpRpcClient {
  client: reqwest::Client,
  url: String,
}

impl HttpRpcClient {
  pub fn new(url: impl Into<String>) -> Self {
    HttpRpcClient {
      client: reqwest::Client::new(),
      url: url.into(),
    }
  }

  pub async fn post_json(&self, body: Vec<u8>) -> NetResult<Vec<u8>> {
    let resp = self
      .client
      .post(&self.url)
      .header("Content-Type", "application/json")
      .body(body)
      .send()
      .await?;
    let bytes = resp.bytes().await?;
    Ok(bytes.to_vec())
  }
}
