// src/parser.rs
//! Contract ABI and conversion of decoded call returns into models.
use alloy::{primitives::Address, sol_types::SolCall};

use crate::{
    error::Result,
    models::{Draw, PrizeTier},
};

pub mod abi {
    alloy::sol! {
        struct Draw {
            uint256 winningRandomNumber;
            uint32 drawId;
            uint64 timestamp;
            uint64 beaconPeriodStartedAt;
            uint32 beaconPeriodSeconds;
        }

        struct PrizeTier {
            uint8 bitRangeSize;
            uint32 drawId;
            uint32 maxPicksPerUser;
            uint32 expiryDuration;
            uint32 endTimestampOffset;
            uint256 prize;
            uint32[16] tiers;
        }

        // ERC20 / Ticket
        function balanceOf(address account) external view returns (uint256);
        function totalSupply() external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function delegateOf(address user) external view returns (address);
        function getBalanceAt(address user, uint64 timestamp) external view returns (uint256);

        // PrizePool
        function depositTo(address to, uint256 amount) external;

        // DrawBuffer
        function getNewestDraw() external view returns (Draw memory);
        function getOldestDraw() external view returns (Draw memory);
        function getDraws(uint32[] drawIds) external view returns (Draw[] memory);

        // PrizeTierHistory
        function getPrizeTier(uint32 drawId) external view returns (PrizeTier memory);

        // PrizeDistributor / DrawCalculator
        function getDrawPayoutBalanceOf(address user, uint32 drawId) external view returns (uint256);
        function getNormalizedBalancesForDrawIds(address user, uint32[] drawIds) external view returns (uint256[] memory);
    }
}

/// Decode the return data of `C`. Offsets and lengths are bounds-checked by
/// the decoder, so a malformed response is an error rather than a panic.
pub fn decode_returns<C: SolCall>(data: &[u8]) -> Result<C::Return> {
    Ok(C::abi_decode_returns(data)?)
}

/// Zero address means no delegate set
pub fn delegate_or_none(address: Address) -> Option<Address> {
    (!address.is_zero()).then_some(address)
}

impl From<abi::Draw> for Draw {
    fn from(d: abi::Draw) -> Self {
        Self {
            draw_id: d.drawId,
            winning_random_number: d.winningRandomNumber,
            timestamp: d.timestamp,
            beacon_period_started_at: d.beaconPeriodStartedAt,
            beacon_period_seconds: d.beaconPeriodSeconds,
        }
    }
}

impl From<abi::PrizeTier> for PrizeTier {
    fn from(t: abi::PrizeTier) -> Self {
        Self {
            bit_range_size: t.bitRangeSize,
            draw_id: t.drawId,
            max_picks_per_user: t.maxPicksPerUser,
            expiry_duration: t.expiryDuration,
            end_timestamp_offset: t.endTimestampOffset,
            prize: t.prize,
            tiers: t.tiers.to_vec(),
        }
    }
}
