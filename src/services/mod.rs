pub mod launch_feed;
pub mod native_price;
pub mod token_chart;
pub mod trending;

pub use launch_feed::LaunchFeedService;
pub use native_price::NativePriceService;
pub use token_chart::TokenChartService;
pub use trending::TrendingService;
