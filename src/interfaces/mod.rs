pub mod providers;
pub mod scraper;
