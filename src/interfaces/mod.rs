pub mod client;
pub mod csv;
