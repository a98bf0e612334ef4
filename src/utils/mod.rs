pub mod hash;
pub mod in_flight;
pub mod validation;
