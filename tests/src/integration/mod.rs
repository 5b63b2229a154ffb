//! Integration tests across `evbus` and `evbus-runtime`.

pub mod fixtures;

#[cfg(test)]
mod propagation;
#[cfg(test)]
mod scenarios;
