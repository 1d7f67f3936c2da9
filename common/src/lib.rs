pub use logger::*;
pub use ring_buffer::*;

pub mod logger;
pub mod ring_buffer;
