/// In-memory devices and frame builders for exercising a stack without a network.
pub mod test;
