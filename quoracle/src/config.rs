use std::env;

/// Daemon configuration, populated from environment variables (optionally
/// loaded from a `.env` file by `main`), mirroring the recognised
/// configuration keys: rpc host, key-store directory, local listen port, tx
/// forwarder host, commitment level, publish cadence, capture file,
/// max batch size, and compute-budget knobs.
#[derive(Debug, Clone)]
pub struct Config {
  pub rpc_host: String,
  pub key_store_dir: String,
  pub listen_port: u16,
  pub tx_host: Option<String>,
  pub commitment: String,
  pub publish_interval_ms: u64,
  pub capture_file: Option<String>,
  pub max_batch_size: usize,
  pub cu_units: u32,
  pub cu_price: u64,
  pub mapping_account: String,
  pub program_id: String,
}

fn env_or(key: &str, default: &str) -> String {
  env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
  env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Default JSON-RPC port when `rpc_host` carries no explicit port, per the
/// recognised `host[:rpc_port[:ws_port]]` configuration grammar.
const DEFAULT_RPC_PORT: u16 = 8899;

impl Config {
  /// Splits `rpc_host` into `(http_url, ws_url)` per the `host[:rpc_port[:ws_port]]`
  /// grammar: the websocket port defaults to `rpc_port + 1` when not given, and the
  /// RPC port defaults to 8899 when neither is given. A host that already names a
  /// scheme (`http://` / `https://`) is passed through unchanged for both, since
  /// cluster RPC providers are commonly configured as full URLs.
  pub fn rpc_urls(&self) -> (String, String) {
    if self.rpc_host.starts_with("http://") || self.rpc_host.starts_with("https://") {
      let ws = self.rpc_host.replacen("http", "ws", 1);
      return (self.rpc_host.clone(), ws);
    }
    let mut parts = self.rpc_host.splitn(3, ':');
    let host = parts.next().unwrap_or("127.0.0.1");
    let rpc_port: u16 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(DEFAULT_RPC_PORT);
    let ws_port: u16 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(rpc_port + 1);
    (format!("http://{}:{}", host, rpc_port), format!("ws://{}:{}", host, ws_port))
  }
}

impl Config {
  /// Reads every recognised key from the process environment. Required keys
  /// (`QUORACLE_RPC_HOST`, `QUORACLE_KEY_STORE_DIR`, `QUORACLE_MAPPING_ACCOUNT`,
  /// `QUORACLE_PROGRAM_ID`) error out with a descriptive message rather than
  /// silently defaulting, since a daemon started with no cluster or no
  /// identity to publish under can't do anything useful.
  pub fn from_env() -> anyhow::Result<Self> {
    let rpc_host = env::var("QUORACLE_RPC_HOST").map_err(|_| anyhow::anyhow!("QUORACLE_RPC_HOST is required"))?;
    let key_store_dir =
      env::var("QUORACLE_KEY_STORE_DIR").map_err(|_| anyhow::anyhow!("QUORACLE_KEY_STORE_DIR is required"))?;
    let mapping_account =
      env::var("QUORACLE_MAPPING_ACCOUNT").map_err(|_| anyhow::anyhow!("QUORACLE_MAPPING_ACCOUNT is required"))?;
    let program_id = env::var("QUORACLE_PROGRAM_ID").map_err(|_| anyhow::anyhow!("QUORACLE_PROGRAM_ID is required"))?;

    Ok(Config {
      rpc_host,
      key_store_dir,
      listen_port: env_parsed("QUORACLE_LISTEN_PORT", 8910),
      tx_host: env::var("QUORACLE_TX_HOST").ok(),
      commitment: env_or("QUORACLE_COMMITMENT", "confirmed"),
      publish_interval_ms: env_parsed("QUORACLE_PUBLISH_INTERVAL_MS", 400),
      capture_file: env::var("QUORACLE_CAPTURE_FILE").ok(),
      max_batch_size: env_parsed("QUORACLE_MAX_BATCH_SIZE", 8),
      cu_units: env_parsed("QUORACLE_CU_UNITS", 0),
      cu_price: env_parsed("QUORACLE_CU_PRICE", 0),
      mapping_account,
      program_id,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn env_parsed_falls_back_to_default_on_missing_or_bad_value() {
    assert_eq!(env_parsed::<u64>("QUORACLE_DOES_NOT_EXIST", 400), 400);
  }

  fn base_config(rpc_host: &str) -> Config {
    Config {
      rpc_host: rpc_host.to_string(),
      key_store_dir: "/tmp".to_string(),
      listen_port: 8910,
      tx_host: None,
      commitment: "confirmed".to_string(),
      publish_interval_ms: 400,
      capture_file: None,
      max_batch_size: 8,
      cu_units: 0,
      cu_price: 0,
      mapping_account: "11111111111111111111111111111111".to_string(),
      program_id: "11111111111111111111111111111111".to_string(),
    }
  }

  #[test]
  fn rpc_urls_defaults_rpc_and_ws_ports() {
    let (http, ws) = base_config("localhost").rpc_urls();
    assert_eq!(http, "http://localhost:8899");
    assert_eq!(ws, "ws://localhost:8900");
  }

  #[test]
  fn rpc_urls_honors_explicit_ports() {
    let (http, ws) = base_config("localhost:8000:8001").rpc_urls();
    assert_eq!(http, "http://localhost:8000");
    assert_eq!(ws, "ws://localhost:8001");
  }

  #[test]
  fn rpc_urls_passes_through_full_urls() {
    let (http, ws) = base_config("https://api.mainnet-beta.solana.com").rpc_urls();
    assert_eq!(http, "https://api.mainnet-beta.solana.com");
    assert_eq!(ws, "wss://api.mainnet-beta.solana.com");
  }
}
