//! Offer selection policies.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::marketplace::Offer;

/// Picks one offer from the ordered search results.
///
/// Implementations must be deterministic: the same slice always yields the
/// same offer.
pub trait SelectionStrategy {
    /// Returns the chosen offer, or `None` when `offers` is empty.
    fn select<'a>(&self, offers: &'a [Offer]) -> Option<&'a Offer>;
}

/// Takes the first offer, relying on the upstream price-ascending order.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CheapestFirst;

impl SelectionStrategy for CheapestFirst {
    fn select<'a>(&self, offers: &'a [Offer]) -> Option<&'a Offer> {
        offers.first()
    }
}

/// Takes the offer with the lowest price per GPU. Ties keep upstream order.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BestValue;

impl SelectionStrategy for BestValue {
    fn select<'a>(&self, offers: &'a [Offer]) -> Option<&'a Offer> {
        offers.iter().fold(None, |best: Option<&Offer>, candidate| match best {
            Some(current) if current.price_per_gpu() <= candidate.price_per_gpu() => Some(current),
            _ => Some(candidate),
        })
    }
}

/// Runtime-selectable policy, used where the strategy comes from
/// configuration.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SelectionPolicy {
    /// See [`CheapestFirst`].
    #[default]
    Cheapest,
    /// See [`BestValue`].
    BestValue,
}

impl SelectionStrategy for SelectionPolicy {
    fn select<'a>(&self, offers: &'a [Offer]) -> Option<&'a Offer> {
        match self {
            Self::Cheapest => CheapestFirst.select(offers),
            Self::BestValue => BestValue.select(offers),
        }
    }
}

/// Raised when a policy name is not recognised.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unknown selection strategy '{0}' (expected cheapest or best-value)")]
pub struct UnknownPolicy(pub String);

impl FromStr for SelectionPolicy {
    type Err = UnknownPolicy;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cheapest" | "cheapest-first" => Ok(Self::Cheapest),
            "best-value" | "value" => Ok(Self::BestValue),
            _ => Err(UnknownPolicy(value.to_owned())),
        }
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Cheapest => "cheapest",
            Self::BestValue => "best-value",
        })
    }
}
