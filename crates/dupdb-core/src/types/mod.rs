pub mod range;
pub mod request;
pub mod store_name;

pub use range::{Direction, KeyRange, TxMode, TxOutcome, TxState};
pub use request::{Delivery, Request, Responder};
pub use store_name::StoreName;
