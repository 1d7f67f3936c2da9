pub mod buf;
pub mod connector;
pub mod error;
pub mod frame;
pub mod http;
pub mod listener;
pub mod udp;
pub mod ws;

pub use buf::{WriteQueue, NET_BUF_SIZE};
pub use connector::{connect_with_backoff, Backoff, ConnState};
pub use error::{NetError, NetResult};
pub use http::HttpRpcClient;
pub use listener::LocalListener;
pub use udp::UdpSender;
pub use ws::WsConnection;
