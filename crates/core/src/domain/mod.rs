pub mod client;
pub mod project;
pub mod quote;
pub mod rates;
