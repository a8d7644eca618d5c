mod manager;
mod parse;
mod transport;

pub use manager::{DatasourceKind, DatasourceManager, FetchTarget};
pub use parse::parse_graph_payload;
#[cfg(test)]
pub use transport::{FetchError, FetchResponse};
pub use transport::{CommandTransport, DEFAULT_FETCH_TIMEOUT, FileTransport, Transport};
