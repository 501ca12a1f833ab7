pub mod error;
pub mod portfolio;
pub mod routes;
pub mod stocks;
pub mod trades;
pub mod users;
