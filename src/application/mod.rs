// Application layer - use cases and orchestration over the ledger store.

pub mod error;
pub mod reporting;
pub mod service;
pub mod session;

pub use error::*;
pub use reporting::*;
pub use service::*;
pub use session::*;
