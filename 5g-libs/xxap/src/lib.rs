mod cause;
mod conversion;
mod ies;

pub use cause::*;
pub use ies::*;
