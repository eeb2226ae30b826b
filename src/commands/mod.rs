pub mod fetch_tiles;
pub mod list_runs;
pub mod reindex;

pub use fetch_tiles::fetch_tiles;
pub use list_runs::list_runs;
pub use reindex::reindex;
