pub mod compare;
pub mod fixture;
pub mod rowset;
pub mod value;

pub use compare::{compare, Mismatch, Verdict};
pub use fixture::DateFormat;
pub use rowset::RowSet;
pub use value::Value;
