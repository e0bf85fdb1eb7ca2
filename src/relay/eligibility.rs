// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::fmt;

use chrono::{DateTime, Utc};

use crate::config::DEFAULT_MIN_REWARD;
use crate::ledger::PendingRequest;

/// Fee paid by the relay for one settlement transaction: 0.005 of a
/// 10^8-unit coin.
pub const SUBMISSION_FEE: i64 = 500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayPolicy {
    pub submission_fee: i64,
    pub min_margin: i64,
}

impl RelayPolicy {
    pub fn new(min_margin: i64) -> Self {
        Self {
            submission_fee: SUBMISSION_FEE,
            min_margin,
        }
    }

    pub fn required_reward(&self) -> i64 {
        self.submission_fee.saturating_add(self.min_margin)
    }

    pub fn evaluate(&self, request: &PendingRequest, now: DateTime<Utc>) -> Eligibility {
        if request.is_expired_at(now) {
            return Eligibility::Recyclable;
        }
        let required = self.required_reward();
        if request.reward < required {
            return Eligibility::Ineligible(IneligibleReason::RewardTooLow {
                reward: request.reward,
                required,
            });
        }
        if now < request.after {
            return Eligibility::Ineligible(IneligibleReason::NotYetOpen {
                after: request.after,
            });
        }
        Eligibility::Eligible
    }
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_REWARD)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Ineligible(IneligibleReason),
    /// Past `before`; only a recycle can move it now.
    Recyclable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IneligibleReason {
    RewardTooLow { reward: i64, required: i64 },
    NotYetOpen { after: DateTime<Utc> },
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IneligibleReason::RewardTooLow { reward, required } => {
                write!(f, "reward {reward} below required {required}")
            }
            IneligibleReason::NotYetOpen { after } => {
                write!(f, "not valid before {}", after.to_rfc3339())
            }
        }
    }
}
