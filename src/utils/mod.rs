pub mod in_flight;
pub mod validation;
