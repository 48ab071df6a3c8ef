//! Address cleanup and matching against the property data API.

mod matching;
mod normalize;

pub use matching::{PropertyAddresses, PropertyMatchClient, MATCH_BATCH_SIZE};
pub use normalize::{AddressError, AddressNormalizer, MatchAddress, MatchRequest, ParsedAddress};
