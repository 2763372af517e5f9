pub mod known_markets;

pub use known_markets::KnownMarkets;
