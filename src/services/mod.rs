pub mod admin;
pub mod feed_sync;
pub mod firestore;
pub mod hearts;
pub mod reconciler;
pub mod sprint_clock;
pub mod store;
