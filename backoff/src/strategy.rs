/// Multiplicative backoff. A factor of `1.0` degrades to a fixed interval.
pub mod exponential;
