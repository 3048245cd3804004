pub mod binance;
pub mod mock;

pub use binance::BinanceProvider;
pub use mock::MockProvider;
