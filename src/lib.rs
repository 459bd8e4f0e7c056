pub mod batch;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod lifecycle;
pub mod model;
pub mod retry;

pub use config::{DelayRange, FetcherConfig};
pub use error::FetchError;
pub use fetcher::{Fetcher, with_fetcher};
pub use http::{HttpResponse, ReqwestTransport, Transport};
pub use model::{FetchRequest, FetchResult};
pub use retry::RetryPolicy;
