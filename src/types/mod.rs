pub mod account;
pub mod money;
pub mod position;
pub mod quote;
pub mod trade;
