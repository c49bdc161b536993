//! Flight offers and everything applied to them after preference resolution:
//! parameter compilation, post-hoc filtering, and ranking.

pub mod amadeus;
pub mod compile;
pub mod filter;
pub mod offer;
pub mod rank;

pub use self::compile::{
    compile, compile_with, DepartureWindow, FilterSpec, PassengerDefaults, SearchParams,
    SearchRequest,
};
pub use self::filter::filter_offers;
pub use self::offer::{parse_duration_minutes, FlightOffer, OfferTag, TravelClass};
pub use self::rank::{rank_offers, RankingWeights};

/// Errors from converting upstream flight data.
#[derive(Debug, thiserror::Error)]
pub enum OfferError {
    /// The payload was not valid JSON of the expected shape.
    #[error("malformed flight offer payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// An unknown travel class string.
    #[error("invalid travel class: {0:?}")]
    InvalidTravelClass(String),
}
