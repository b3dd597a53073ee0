#![no_std]
use flowfarm_shared::{
    apply_basis_points, mul_div_floor, validate_non_negative_amount, validate_split,
    MintableTokenClient, PendingRewards, RewarderClient, ACC_REWARD_PRECISION,
};
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, log, symbol_short, token, Address, Env,
};

// Data Types
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EngineConfig {
    pub owner: Address,
    pub reward_token: Address,
    pub start_time: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EmissionState {
    pub reward_per_second: i128,
    pub burn_split: i128, // Basis points of every emission that is burned
    pub total_weight: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PoolInfo {
    pub stake_token: Address,
    pub weight: u32,
    pub staked_total: i128,
    pub acc_reward_per_share: i128, // Scaled by ACC_REWARD_PRECISION
    pub last_reward_time: u64,
    pub rewarder: Option<Address>,
}

#[contracttype]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UserStake {
    pub amount: i128,
    pub reward_debt: i128,
}

// Storage Keys
#[contracttype]
pub enum DataKey {
    Config,
    Emission,
    PoolCount,
    Pool(u32),
    UserStake(u32, Address), // pool_id, user
    StakeTokenPool(Address), // Guards against registering a stake token twice
}

// Error Types
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum EngineError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    Unauthorized = 3,
    InvalidAmount = 4,
    BurnSplitTooHigh = 5,
    DuplicatePool = 6,
    PoolNotFound = 7,
    InsufficientStake = 8,
    NumericOverflow = 9,
    RewarderMismatch = 10,
}

// Events
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PoolConfiguredEvent {
    pub pool_id: u32,
    pub weight: u32,
    pub stake_token: Address,
    pub rewarder: Option<Address>,
    pub total_weight: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StakeEvent {
    pub user: Address,
    pub pool_id: u32,
    pub amount: i128,
    pub new_stake: i128,
    pub timestamp: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HarvestEvent {
    pub user: Address,
    pub pool_id: u32,
    pub amount: i128,
    pub timestamp: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SettleEvent {
    pub pool_id: u32,
    pub minted: i128,
    pub burned: i128,
    pub acc_reward_per_share: i128,
    pub timestamp: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParameterChangedEvent {
    pub old_value: i128,
    pub new_value: i128,
    pub timestamp: u64,
}

/// Outcome of bringing a pool up to a point in time.
struct Accrual {
    pool: PoolInfo,
    minted: i128,
    burned: i128,
}

#[contract]
pub struct RewardEngine;

#[contractimpl]
impl RewardEngine {
    /// Initialize the engine. The engine must own `reward_token` before the
    /// first pool accrues anything, since every settlement mints.
    pub fn initialize(
        env: Env,
        owner: Address,
        reward_token: Address,
        reward_per_second: i128,
        burn_split: i128,
        start_time: u64,
    ) -> Result<(), EngineError> {
        if env.storage().instance().has(&DataKey::Config) {
            return Err(EngineError::AlreadyInitialized);
        }

        owner.require_auth();

        if !validate_non_negative_amount(reward_per_second) || burn_split < 0 {
            return Err(EngineError::InvalidAmount);
        }

        if !validate_split(burn_split) {
            return Err(EngineError::BurnSplitTooHigh);
        }

        let config = EngineConfig {
            owner: owner.clone(),
            reward_token,
            start_time,
        };

        let emission = EmissionState {
            reward_per_second,
            burn_split,
            total_weight: 0,
        };

        env.storage().instance().set(&DataKey::Config, &config);
        env.storage().instance().set(&DataKey::Emission, &emission);
        env.storage().instance().set(&DataKey::PoolCount, &0u32);

        log!(&env, "Reward engine initialized by owner: {}", owner);

        Ok(())
    }

    // ------------------------------------------------------------------------
    // Pool administration
    // ------------------------------------------------------------------------

    /// Register a new pool for `stake_token` (owner only)
    pub fn add_pool(
        env: Env,
        owner: Address,
        weight: u32,
        stake_token: Address,
        rewarder: Option<Address>,
    ) -> Result<u32, EngineError> {
        owner.require_auth();

        let config = Self::get_config(&env)?;

        if config.owner != owner {
            return Err(EngineError::Unauthorized);
        }

        let registry_key = DataKey::StakeTokenPool(stake_token.clone());
        if env.storage().persistent().has(&registry_key) {
            return Err(EngineError::DuplicatePool);
        }

        if let Some(rewarder) = &rewarder {
            Self::check_rewarder(&env, rewarder, &stake_token)?;
        }

        // Every pool's share changes with the total weight
        Self::settle_all(&env)?;

        let pool_id = Self::pool_length(env.clone());
        let pool = PoolInfo {
            stake_token: stake_token.clone(),
            weight,
            staked_total: 0,
            acc_reward_per_share: 0,
            last_reward_time: env.ledger().timestamp().max(config.start_time),
            rewarder: rewarder.clone(),
        };

        let mut emission = Self::get_emission(&env)?;
        emission.total_weight = emission
            .total_weight
            .checked_add(weight as u64)
            .ok_or(EngineError::NumericOverflow)?;

        env.storage().persistent().set(&DataKey::Pool(pool_id), &pool);
        env.storage().persistent().set(&registry_key, &pool_id);
        env.storage().instance().set(&DataKey::PoolCount, &(pool_id + 1));
        env.storage().instance().set(&DataKey::Emission, &emission);

        let event = PoolConfiguredEvent {
            pool_id,
            weight,
            stake_token: stake_token.clone(),
            rewarder,
            total_weight: emission.total_weight,
        };
        env.events().publish((symbol_short!("add_pool"),), event);

        log!(&env, "Pool {} added for {} with weight {}", pool_id, stake_token, weight);

        Ok(pool_id)
    }

    /// Reweight a pool and optionally swap its rewarder (owner only)
    pub fn set_pool(
        env: Env,
        owner: Address,
        pool_id: u32,
        weight: u32,
        rewarder: Option<Address>,
        overwrite_rewarder: bool,
    ) -> Result<(), EngineError> {
        owner.require_auth();

        let config = Self::get_config(&env)?;

        if config.owner != owner {
            return Err(EngineError::Unauthorized);
        }

        let current = Self::get_pool(&env, pool_id)?;
        if overwrite_rewarder {
            if let Some(rewarder) = &rewarder {
                Self::check_rewarder(&env, rewarder, &current.stake_token)?;
            }
        }

        Self::settle_all(&env)?;

        let mut pool = Self::get_pool(&env, pool_id)?;
        let mut emission = Self::get_emission(&env)?;
        emission.total_weight = emission
            .total_weight
            .checked_sub(pool.weight as u64)
            .and_then(|total| total.checked_add(weight as u64))
            .ok_or(EngineError::NumericOverflow)?;

        pool.weight = weight;
        if overwrite_rewarder {
            pool.rewarder = rewarder;
        }

        env.storage().persistent().set(&DataKey::Pool(pool_id), &pool);
        env.storage().instance().set(&DataKey::Emission, &emission);

        let event = PoolConfiguredEvent {
            pool_id,
            weight,
            stake_token: pool.stake_token.clone(),
            rewarder: pool.rewarder.clone(),
            total_weight: emission.total_weight,
        };
        env.events().publish((symbol_short!("set_pool"),), event);

        log!(&env, "Pool {} weight set to {}", pool_id, weight);

        Ok(())
    }

    // ------------------------------------------------------------------------
    // Global emission parameters
    // ------------------------------------------------------------------------

    /// Change the emission rate; everything accrued so far is locked in at the old rate
    pub fn set_emission_rate(env: Env, owner: Address, new_rate: i128) -> Result<(), EngineError> {
        owner.require_auth();

        let config = Self::get_config(&env)?;

        if config.owner != owner {
            return Err(EngineError::Unauthorized);
        }

        if !validate_non_negative_amount(new_rate) {
            return Err(EngineError::InvalidAmount);
        }

        Self::settle_all(&env)?;

        let mut emission = Self::get_emission(&env)?;
        let old_rate = emission.reward_per_second;
        emission.reward_per_second = new_rate;
        env.storage().instance().set(&DataKey::Emission, &emission);

        let event = ParameterChangedEvent {
            old_value: old_rate,
            new_value: new_rate,
            timestamp: env.ledger().timestamp(),
        };
        env.events().publish((symbol_short!("rate"),), event);

        log!(&env, "Emission rate updated from {} to {}", old_rate, new_rate);

        Ok(())
    }

    /// Change the burned share of every emission, in basis points
    pub fn set_burn_split(env: Env, owner: Address, burn_split: i128) -> Result<(), EngineError> {
        owner.require_auth();

        let config = Self::get_config(&env)?;

        if config.owner != owner {
            return Err(EngineError::Unauthorized);
        }

        if burn_split < 0 {
            return Err(EngineError::InvalidAmount);
        }

        if !validate_split(burn_split) {
            return Err(EngineError::BurnSplitTooHigh);
        }

        Self::settle_all(&env)?;

        let mut emission = Self::get_emission(&env)?;
        let old_split = emission.burn_split;
        emission.burn_split = burn_split;
        env.storage().instance().set(&DataKey::Emission, &emission);

        let event = ParameterChangedEvent {
            old_value: old_split,
            new_value: burn_split,
            timestamp: env.ledger().timestamp(),
        };
        env.events().publish((symbol_short!("burn_pct"),), event);

        log!(&env, "Burn split updated from {} to {}", old_split, burn_split);

        Ok(())
    }

    pub fn transfer_ownership(
        env: Env,
        owner: Address,
        new_owner: Address,
    ) -> Result<(), EngineError> {
        owner.require_auth();

        let mut config = Self::get_config(&env)?;

        if config.owner != owner {
            return Err(EngineError::Unauthorized);
        }

        config.owner = new_owner.clone();
        env.storage().instance().set(&DataKey::Config, &config);

        log!(&env, "Engine ownership transferred to {}", new_owner);

        Ok(())
    }

    // ------------------------------------------------------------------------
    // Settlement
    // ------------------------------------------------------------------------

    /// Bring one pool's accumulator up to now (permissionless)
    pub fn update_pool(env: Env, pool_id: u32) -> Result<PoolInfo, EngineError> {
        Self::get_config(&env)?;
        Self::settle_pool(&env, pool_id)
    }

    /// Bring every pool's accumulator up to now (permissionless)
    pub fn mass_update_pools(env: Env) -> Result<(), EngineError> {
        Self::get_config(&env)?;
        Self::settle_all(&env)
    }

    // ------------------------------------------------------------------------
    // Staking
    // ------------------------------------------------------------------------

    /// Stake `amount` into a pool, paying out whatever the caller had pending.
    /// A zero amount is a plain harvest.
    pub fn deposit(env: Env, user: Address, pool_id: u32, amount: i128) -> Result<(), EngineError> {
        user.require_auth();

        let config = Self::get_config(&env)?;

        if !validate_non_negative_amount(amount) {
            return Err(EngineError::InvalidAmount);
        }

        let mut pool = Self::settle_pool(&env, pool_id)?;
        let mut stake = Self::load_stake(&env, pool_id, &user);

        if stake.amount > 0 {
            let pending = Self::pending_for(&stake, pool.acc_reward_per_share)?;
            Self::pay_reward(&env, &config, &user, pool_id, pending)?;
        }

        if amount > 0 {
            token::Client::new(&env, &pool.stake_token).transfer(
                &user,
                &env.current_contract_address(),
                &amount,
            );
        }

        stake.amount = stake
            .amount
            .checked_add(amount)
            .ok_or(EngineError::NumericOverflow)?;
        pool.staked_total = pool
            .staked_total
            .checked_add(amount)
            .ok_or(EngineError::NumericOverflow)?;
        stake.reward_debt = Self::entitlement(stake.amount, pool.acc_reward_per_share)?;

        env.storage().persistent().set(&DataKey::Pool(pool_id), &pool);
        env.storage()
            .persistent()
            .set(&DataKey::UserStake(pool_id, user.clone()), &stake);

        if let Some(rewarder) = &pool.rewarder {
            RewarderClient::new(&env, rewarder).on_stake_change(&user, &stake.amount);
        }

        let event = StakeEvent {
            user: user.clone(),
            pool_id,
            amount,
            new_stake: stake.amount,
            timestamp: env.ledger().timestamp(),
        };
        env.events().publish((symbol_short!("deposit"),), event);

        log!(&env, "User {} deposited {} into pool {}", user, amount, pool_id);

        Ok(())
    }

    /// Unstake `amount` from a pool, paying out whatever the caller had pending
    pub fn withdraw(env: Env, user: Address, pool_id: u32, amount: i128) -> Result<(), EngineError> {
        user.require_auth();

        let config = Self::get_config(&env)?;

        if !validate_non_negative_amount(amount) {
            return Err(EngineError::InvalidAmount);
        }

        Self::get_pool(&env, pool_id)?;
        let mut stake = Self::load_stake(&env, pool_id, &user);
        if stake.amount < amount {
            return Err(EngineError::InsufficientStake);
        }

        let mut pool = Self::settle_pool(&env, pool_id)?;

        let pending = Self::pending_for(&stake, pool.acc_reward_per_share)?;
        Self::pay_reward(&env, &config, &user, pool_id, pending)?;

        stake.amount -= amount;
        pool.staked_total = pool
            .staked_total
            .checked_sub(amount)
            .ok_or(EngineError::NumericOverflow)?;
        stake.reward_debt = Self::entitlement(stake.amount, pool.acc_reward_per_share)?;

        env.storage().persistent().set(&DataKey::Pool(pool_id), &pool);
        env.storage()
            .persistent()
            .set(&DataKey::UserStake(pool_id, user.clone()), &stake);

        if amount > 0 {
            token::Client::new(&env, &pool.stake_token).transfer(
                &env.current_contract_address(),
                &user,
                &amount,
            );
        }

        if let Some(rewarder) = &pool.rewarder {
            RewarderClient::new(&env, rewarder).on_stake_change(&user, &stake.amount);
        }

        let event = StakeEvent {
            user: user.clone(),
            pool_id,
            amount,
            new_stake: stake.amount,
            timestamp: env.ledger().timestamp(),
        };
        env.events().publish((symbol_short!("withdraw"),), event);

        log!(&env, "User {} withdrew {} from pool {}", user, amount, pool_id);

        Ok(())
    }

    /// Return the caller's whole stake without settling; pending rewards,
    /// primary and bonus, are forfeited.
    pub fn emergency_withdraw(env: Env, user: Address, pool_id: u32) -> Result<i128, EngineError> {
        user.require_auth();

        Self::get_config(&env)?;

        let mut pool = Self::get_pool(&env, pool_id)?;
        let stake = Self::load_stake(&env, pool_id, &user);
        let amount = stake.amount;

        pool.staked_total = pool
            .staked_total
            .checked_sub(amount)
            .ok_or(EngineError::NumericOverflow)?;

        env.storage().persistent().set(&DataKey::Pool(pool_id), &pool);
        env.storage().persistent().set(
            &DataKey::UserStake(pool_id, user.clone()),
            &UserStake::default(),
        );

        if amount > 0 {
            token::Client::new(&env, &pool.stake_token).transfer(
                &env.current_contract_address(),
                &user,
                &amount,
            );
        }

        if let Some(rewarder) = &pool.rewarder {
            RewarderClient::new(&env, rewarder).on_forfeit(&user);
        }

        let event = StakeEvent {
            user: user.clone(),
            pool_id,
            amount,
            new_stake: 0,
            timestamp: env.ledger().timestamp(),
        };
        env.events().publish((symbol_short!("emergency"),), event);

        log!(&env, "User {} emergency withdrew {} from pool {}", user, amount, pool_id);

        Ok(amount)
    }

    // ------------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------------

    /// What `user` would receive from a pool if it were settled right now
    pub fn pending_reward(env: Env, pool_id: u32, user: Address) -> Result<PendingRewards, EngineError> {
        let emission = Self::get_emission(&env)?;
        let pool = Self::get_pool(&env, pool_id)?;
        let stake = Self::load_stake(&env, pool_id, &user);

        let accrual = Self::accrue(&emission, &pool, env.ledger().timestamp())?;
        let pending_primary = Self::pending_for(&stake, accrual.pool.acc_reward_per_share)?;

        let (pending_bonus, bonus_token) = match &pool.rewarder {
            Some(rewarder) => {
                let client = RewarderClient::new(&env, rewarder);
                (client.pending_bonus(&user), Some(client.bonus_token()))
            }
            None => (0, None),
        };

        Ok(PendingRewards {
            pending_primary,
            pending_bonus,
            bonus_token,
        })
    }

    pub fn pool_length(env: Env) -> u32 {
        env.storage().instance().get(&DataKey::PoolCount).unwrap_or(0)
    }

    pub fn pool_info(env: Env, pool_id: u32) -> Result<PoolInfo, EngineError> {
        Self::get_pool(&env, pool_id)
    }

    pub fn user_info(env: Env, pool_id: u32, user: Address) -> UserStake {
        Self::load_stake(&env, pool_id, &user)
    }

    pub fn total_weight(env: Env) -> Result<u64, EngineError> {
        Ok(Self::get_emission(&env)?.total_weight)
    }

    pub fn reward_per_second(env: Env) -> Result<i128, EngineError> {
        Ok(Self::get_emission(&env)?.reward_per_second)
    }

    pub fn burn_split(env: Env) -> Result<i128, EngineError> {
        Ok(Self::get_emission(&env)?.burn_split)
    }

    pub fn start_time(env: Env) -> Result<u64, EngineError> {
        Ok(Self::get_config(&env)?.start_time)
    }

    pub fn owner(env: Env) -> Result<Address, EngineError> {
        Ok(Self::get_config(&env)?.owner)
    }

    pub fn reward_token(env: Env) -> Result<Address, EngineError> {
        Ok(Self::get_config(&env)?.reward_token)
    }

    // Internal helper functions
    fn get_config(env: &Env) -> Result<EngineConfig, EngineError> {
        env.storage()
            .instance()
            .get(&DataKey::Config)
            .ok_or(EngineError::NotInitialized)
    }

    fn get_emission(env: &Env) -> Result<EmissionState, EngineError> {
        env.storage()
            .instance()
            .get(&DataKey::Emission)
            .ok_or(EngineError::NotInitialized)
    }

    fn get_pool(env: &Env, pool_id: u32) -> Result<PoolInfo, EngineError> {
        env.storage()
            .persistent()
            .get(&DataKey::Pool(pool_id))
            .ok_or(EngineError::PoolNotFound)
    }

    fn load_stake(env: &Env, pool_id: u32, user: &Address) -> UserStake {
        env.storage()
            .persistent()
            .get(&DataKey::UserStake(pool_id, user.clone()))
            .unwrap_or_default()
    }

    /// Pool state as of `now`, with the emission it implies.
    ///
    /// Time with nothing staked (or no weight) only moves `last_reward_time`;
    /// that emission is never minted.
    fn accrue(emission: &EmissionState, pool: &PoolInfo, now: u64) -> Result<Accrual, EngineError> {
        let mut next = pool.clone();
        if now <= pool.last_reward_time {
            return Ok(Accrual {
                pool: next,
                minted: 0,
                burned: 0,
            });
        }

        next.last_reward_time = now;
        if pool.staked_total == 0 || pool.weight == 0 || emission.total_weight == 0 {
            return Ok(Accrual {
                pool: next,
                minted: 0,
                burned: 0,
            });
        }

        let elapsed = (now - pool.last_reward_time) as i128;
        let emitted = elapsed
            .checked_mul(emission.reward_per_second)
            .ok_or(EngineError::NumericOverflow)?;
        let pool_reward = mul_div_floor(emitted, pool.weight as i128, emission.total_weight as i128)
            .ok_or(EngineError::NumericOverflow)?;
        let burned = apply_basis_points(pool_reward, emission.burn_split)
            .ok_or(EngineError::NumericOverflow)?;
        let user_share = pool_reward - burned;

        let increment = mul_div_floor(user_share, ACC_REWARD_PRECISION, pool.staked_total)
            .ok_or(EngineError::NumericOverflow)?;
        next.acc_reward_per_share = pool
            .acc_reward_per_share
            .checked_add(increment)
            .ok_or(EngineError::NumericOverflow)?;

        Ok(Accrual {
            pool: next,
            minted: pool_reward,
            burned,
        })
    }

    fn settle_pool(env: &Env, pool_id: u32) -> Result<PoolInfo, EngineError> {
        let emission = Self::get_emission(env)?;
        let pool = Self::get_pool(env, pool_id)?;
        let now = env.ledger().timestamp();

        let accrual = Self::accrue(&emission, &pool, now)?;
        if accrual.pool == pool {
            return Ok(pool);
        }

        if accrual.minted > 0 {
            let config = Self::get_config(env)?;
            let engine = env.current_contract_address();
            let reward_token = MintableTokenClient::new(env, &config.reward_token);

            reward_token.mint(&engine, &engine, &accrual.minted);
            if accrual.burned > 0 {
                reward_token.burn(&engine, &accrual.burned);
            }

            let event = SettleEvent {
                pool_id,
                minted: accrual.minted,
                burned: accrual.burned,
                acc_reward_per_share: accrual.pool.acc_reward_per_share,
                timestamp: now,
            };
            env.events().publish((symbol_short!("settle"),), event);
        }

        env.storage()
            .persistent()
            .set(&DataKey::Pool(pool_id), &accrual.pool);

        Ok(accrual.pool)
    }

    /// A rewarder may only be attached to the pool of its own stake token and
    /// must take notifications from this engine
    fn check_rewarder(env: &Env, rewarder: &Address, stake_token: &Address) -> Result<(), EngineError> {
        let client = RewarderClient::new(env, rewarder);
        if client.stake_token() != *stake_token || client.engine() != env.current_contract_address() {
            return Err(EngineError::RewarderMismatch);
        }
        Ok(())
    }

    fn settle_all(env: &Env) -> Result<(), EngineError> {
        let pool_count: u32 = env.storage().instance().get(&DataKey::PoolCount).unwrap_or(0);
        for pool_id in 0..pool_count {
            Self::settle_pool(env, pool_id)?;
        }
        Ok(())
    }

    fn entitlement(amount: i128, acc_reward_per_share: i128) -> Result<i128, EngineError> {
        mul_div_floor(amount, acc_reward_per_share, ACC_REWARD_PRECISION)
            .ok_or(EngineError::NumericOverflow)
    }

    fn pending_for(stake: &UserStake, acc_reward_per_share: i128) -> Result<i128, EngineError> {
        Self::entitlement(stake.amount, acc_reward_per_share)?
            .checked_sub(stake.reward_debt)
            .ok_or(EngineError::NumericOverflow)
    }

    /// Send up to `amount` of minted reward to `user`, capped by what the engine holds
    fn pay_reward(
        env: &Env,
        config: &EngineConfig,
        user: &Address,
        pool_id: u32,
        amount: i128,
    ) -> Result<i128, EngineError> {
        if amount <= 0 {
            return Ok(0);
        }

        let engine = env.current_contract_address();
        let reward_token = MintableTokenClient::new(env, &config.reward_token);
        let paid = amount.min(reward_token.balance(&engine));
        if paid > 0 {
            reward_token.transfer(&engine, user, &paid);

            let event = HarvestEvent {
                user: user.clone(),
                pool_id,
                amount: paid,
                timestamp: env.ledger().timestamp(),
            };
            env.events().publish((symbol_short!("harvest"),), event);
        }

        Ok(paid)
    }
}
