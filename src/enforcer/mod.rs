pub mod error;
pub mod sequence;

pub use error::EnforceError;
pub use sequence::{
    EnforcementOutcome, Enforcer, EnforcerConfig, DEFAULT_FALLBACK_URL, DEFAULT_PAGE_LOAD_GRACE,
};
