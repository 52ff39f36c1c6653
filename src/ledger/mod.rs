//! Cash register ("caisse") and the back-office facade built on it

pub mod cash;
pub mod core;
pub mod filter;

pub use cash::*;
pub use self::core::*;
pub use filter::*;
