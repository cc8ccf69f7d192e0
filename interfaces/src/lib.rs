pub mod defs;
pub mod static_source;

pub use defs::*;
pub use static_source::StaticNewsSource;
