pub mod audit;
pub mod canon;
pub mod catalog;
pub mod config;
pub mod error;
pub mod io;
pub mod paths;
pub mod pending;
pub mod reconcile;
pub mod record;
pub mod roll_number;
pub mod search;
pub mod store;
pub mod transfer;
pub mod types;
pub mod workflow;

pub use error::{RegistryError, Result};
pub use workflow::{Outcome, Registry};
