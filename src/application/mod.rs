//! Application layer containing the card lifecycle and the charge workflow.
//!
//! `CardService` sits behind the card service endpoint. `ChargeOrchestrator`
//! drives a charge across the card service and the charge store, which share
//! no transaction.

pub mod cards;
pub mod orchestrator;
