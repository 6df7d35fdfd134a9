pub mod crypto;
pub mod error;
pub mod ledger;
pub mod record;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod traits;
pub mod types;

pub use error::*;
pub use ledger::*;
pub use record::*;
pub use traits::*;
pub use types::*;
