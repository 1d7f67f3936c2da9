use quoracle::{Config, Manager};

#[tokio::main]
async fn main() {
  dotenv::dotenv().ok();
  common::init_logger();

  let config = match Config::from_env() {
    Ok(config) => config,
    Err(e) => {
      log::error!("configuration error: {}", e);
      std::process::exit(1);
    }
  };

  let manager = match Manager::new(config).await {
    Ok(manager) => manager,
    Err(e) => {
      log::error!("failed to initialize manager: {}", e);
      std::process::exit(1);
    }
  };

  if let Err(e) = manager.run().await {
    log::error!("manager exited with error: {}", e);
    std::process::exit(1);
  }

  std::process::exit(0);
}
