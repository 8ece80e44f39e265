//! Domains module containing business logic organized by bounded contexts.
//!
//! The bridge currently exposes a single domain: tools. Transports and the
//! lifecycle live in [`crate::core`] and reach tools only through the
//! [`tools::Dispatcher`].

pub mod tools;
