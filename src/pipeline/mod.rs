// Record processing between the source client and the transport

pub mod normalize;
