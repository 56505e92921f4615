// Adapters layer: concrete allocation engines behind the `AllocationEngine` port.

pub mod repeated;
