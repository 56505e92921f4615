// Domain layer: valuation / allocation models and the allocation engine port.

pub mod model;
pub mod ports;
