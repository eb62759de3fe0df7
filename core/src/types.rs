//! Shared primitive types used across the scoring core.

use serde::{Deserialize, Serialize};

/// A stable customer identifier.
pub type CustomerId = i64;

/// A bank account number (originating or beneficiary).
pub type AccountNumber = String;

/// A device fingerprint identifier.
pub type DeviceId = String;

/// A baseline averaging horizon.
///
/// Profile averages are normalized spend-per-horizon; the threshold rule
/// simulators select one of these when fetching a limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Horizon {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Horizon {
    /// Length of the horizon in days.
    pub fn days(&self) -> u32 {
        match self {
            Self::Daily => 1,
            Self::Weekly => 7,
            Self::Monthly => 30,
            Self::Yearly => 365,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
            Self::Monthly => "Monthly",
            Self::Yearly => "Yearly",
        }
    }
}

/// Time-of-day bucket for the device usage profile.
/// Boundary hours are fixed at 5, 12, 17 and 22.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBucket {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeBucket {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=21 => Self::Evening,
            _ => Self::Night,
        }
    }
}
