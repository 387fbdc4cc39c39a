//! Application layer containing the escrow orchestration.
//!
//! This module defines the `EscrowEngine`, which sequences the transaction
//! lifecycle, and the `PayoutDispatcher`, which moves value out of escrow with
//! a ledger fallback.

pub mod engine;
pub mod payout;
