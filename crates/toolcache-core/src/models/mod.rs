//! Request and response types passed between the cache, the network client
//! and the fetch handler.

pub mod request;
pub mod response;

pub use request::FetchRequest;
pub use response::AssetResponse;
