pub mod pool_file;
pub mod types;

pub use types::{Credential, mask_secret};
