pub mod entry;
pub mod feed;
pub mod settings;

pub use entry::*;
pub use feed::*;
pub use settings::*;
