mod batch;
pub mod functional;
mod numeric;
mod random;
mod types;

pub use batch::*;
pub use numeric::*;
pub use random::*;
pub use types::*;
