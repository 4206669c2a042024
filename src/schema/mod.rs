pub mod banter;
pub mod beat;
pub mod character;
pub mod event;
pub mod metrics;
pub mod rule;
pub mod trigger;
