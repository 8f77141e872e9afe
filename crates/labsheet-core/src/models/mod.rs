//! Domain models for lab report consolidation.

mod range;
mod report;
mod result;
mod value;

pub use range::*;
pub use report::*;
pub use result::*;
pub use value::*;
