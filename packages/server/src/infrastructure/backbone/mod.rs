//! Broadcast backbone implementations.

mod inmemory;

pub use inmemory::InMemoryBackbone;
