pub mod catalog;
pub mod config;
pub mod engine;
pub mod index;
pub mod ledger;
pub mod paginate;
pub mod playback;
pub mod predicate;
pub mod progression;
pub mod selector;
