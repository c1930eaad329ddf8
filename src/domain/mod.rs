mod account;
mod customer;
mod money;
mod transaction;

pub use account::*;
pub use customer::*;
pub use money::*;
pub use transaction::*;
