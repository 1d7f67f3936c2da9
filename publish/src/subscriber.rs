use std::sync::Arc;

use tokio::sync::Mutex;

use accounts::{MirrorSubscriber, PriceAccount, ProductAccount};

use crate::state::PublishPipeline;

/// Bridges the account mirror's notifications into the publish pipeline's
/// in-flight tracking: whenever this publisher's own component in a price
/// account advances to a slot at or past what was sent, the pipeline's
/// inflight marker for that account is cleared, completing the
/// inflight -> idle transition described in the pipeline state machine.
pub struct PipelineSubscriber {
  pipeline: Arc<Mutex<PublishPipeline>>,
  publisher: [u8; 32],
}

impl PipelineSubscriber {
  pub fn new(pipeline: Arc<Mutex<PublishPipeline>>, publisher: [u8; 32]) -> Self {
    PipelineSubscriber { pipeline, publisher }
  }
}

impl MirrorSubscriber for PipelineSubscriber {
  fn on_response_product(&self, _pubkey: [u8; 32], _product: &ProductAccount, _data: &[u8]) {}

  fn on_response_price_init(&self, _pubkey: [u8; 32], _price: &PriceAccount) {}

  fn on_response_price(&self, pubkey: [u8; 32], price: &PriceAccount) {
    let Some(component) = price.comp.iter().find(|c| c.publisher == self.publisher) else {
      return;
    };
    let confirmed_slot = component.latest.pub_slot;
    let pipeline = self.pipeline.clone();
    tokio::spawn(async move {
      pipeline.lock().await.clear_inflight(pubkey, confirmed_slot);
    });
  }
}
