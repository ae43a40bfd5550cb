mod error;
mod passthrough;
mod server;
mod streaming;

pub use error::ProxyError;
pub use passthrough::UpstreamTarget;
pub use server::{AppState, ProxyServer, create_router};
pub use streaming::{BufferHandle, TeeStream, TeedBody, tee};
