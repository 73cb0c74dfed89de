/// Search and lookup backends
pub mod duckduckgo;
pub mod duckduckgo_js;
pub mod spice;

pub use duckduckgo::DuckDuckGoHtml;
pub use duckduckgo_js::DuckDuckGoJs;
pub use spice::SpiceLookup;
