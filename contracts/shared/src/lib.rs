#![no_std]
use soroban_sdk::{contractclient, contracttype, Address, Env};

// Shared data types used across all FlowFarm contracts
// This keeps the engine, the bonus rewarder and the token on one vocabulary

// ============================================================================
// Cross-Contract Interfaces
// ============================================================================

/// Stake-change capability the reward engine drives on an attached rewarder.
///
/// The engine is the rewarder's only source of truth about stakes: every
/// deposit, withdrawal and harvest ends with `on_stake_change` carrying the
/// user's new total in the pool, and an emergency exit ends with `on_forfeit`.
#[contractclient(name = "RewarderClient")]
pub trait RewarderInterface {
    fn on_stake_change(env: Env, user: Address, new_stake: i128);
    fn on_forfeit(env: Env, user: Address);
    fn pending_bonus(env: Env, user: Address) -> i128;
    fn bonus_token(env: Env) -> Address;
    fn stake_token(env: Env) -> Address;
    fn engine(env: Env) -> Address;
}

/// Mint authority over the reward token, held by whoever the token's owner is.
#[contractclient(name = "MintableTokenClient")]
pub trait MintableTokenInterface {
    fn mint(env: Env, caller: Address, to: Address, amount: i128);
    fn burn(env: Env, from: Address, amount: i128);
    fn transfer(env: Env, from: Address, to: Address, amount: i128);
    fn balance(env: Env, id: Address) -> i128;
    fn total_supply(env: Env) -> i128;
}

// ============================================================================
// Reward Types
// ============================================================================

/// Result of a read-only pending reward simulation.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingRewards {
    pub pending_primary: i128,
    pub pending_bonus: i128,
    pub bonus_token: Option<Address>,
}

// ============================================================================
// Utility Functions for Validation and Fixed-Point Math
// ============================================================================

/// Validate that an amount is positive
pub fn validate_positive_amount(amount: i128) -> bool {
    amount > 0
}

/// Validate that an amount is zero or positive
pub fn validate_non_negative_amount(amount: i128) -> bool {
    amount >= 0
}

/// Validate that a split leaves something on both sides: 0% up to, but not including, 100%
pub fn validate_split(basis_points: i128) -> bool {
    (0..MAX_BASIS_POINTS).contains(&basis_points)
}

/// `a * b / c` rounded toward zero, `None` on overflow or a zero divisor.
pub fn mul_div_floor(a: i128, b: i128, c: i128) -> Option<i128> {
    a.checked_mul(b)?.checked_div(c)
}

/// Portion of `amount` described by `basis_points`, rounded down.
pub fn apply_basis_points(amount: i128, basis_points: i128) -> Option<i128> {
    mul_div_floor(amount, basis_points, MAX_BASIS_POINTS)
}

// ============================================================================
// Constants
// ============================================================================

/// Basis points representing 100% (10000 basis points = 100%)
pub const MAX_BASIS_POINTS: i128 = 10000;

/// Fixed-point scale of every accumulated reward-per-share value
pub const ACC_REWARD_PRECISION: i128 = 1_000_000_000_000;
