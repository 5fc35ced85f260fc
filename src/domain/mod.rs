//! Domain layer: value objects, entities and the ports the application layer
//! depends on.

pub mod card;
pub mod charge;
pub mod money;
pub mod ports;
