//! A build-configuration model graph: hierarchical entities, typed
//! components, lifecycle stages and reactive rules.
//!

pub use arbor_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use arbor_internal::prelude::*;
}
