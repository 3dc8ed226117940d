// Resources served by the binary
pub mod account;
pub mod enums;
pub mod transaction;

pub use account::Account;
pub use transaction::Transaction;
