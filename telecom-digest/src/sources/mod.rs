pub mod file;
pub mod google_search;
pub mod newsapi;
pub mod rss_feed;

pub use file::JsonFileSource;
pub use google_search::GoogleSearchSource;
pub use newsapi::NewsApiSource;
pub use rss_feed::{CompanyFeed, PressReleaseFeedSource};
