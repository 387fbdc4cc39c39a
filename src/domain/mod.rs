//! Domain layer: escrow transactions, the pull-payment ledger, and the ports
//! the application layer drives.

pub mod command;
pub mod events;
pub mod ledger;
pub mod money;
pub mod party;
pub mod ports;
pub mod transaction;
