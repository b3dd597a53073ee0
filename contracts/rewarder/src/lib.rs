#![no_std]
use flowfarm_shared::{mul_div_floor, validate_non_negative_amount, ACC_REWARD_PRECISION};
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, log, symbol_short, token, Address, Env,
};

// Data Types
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RewarderConfig {
    pub owner: Address,
    pub bonus_token: Address,
    pub stake_token: Address,
    pub engine: Address, // The only caller allowed to report stake changes
    pub start_time: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RewarderPool {
    pub acc_token_per_share: i128, // Scaled by ACC_REWARD_PRECISION
    pub last_reward_time: u64,
    pub total_staked: i128, // Sum of the stakes the engine has reported
    pub tokens_per_second: i128,
}

#[contracttype]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UserBonusInfo {
    pub amount: i128,
    pub reward_debt: i128,
    pub unpaid: i128, // Owed but not payable from the on-hand balance yet
}

// Storage Keys
#[contracttype]
pub enum DataKey {
    Config,
    Pool,
    UserInfo(Address),
}

// Error Types
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum RewarderError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    Unauthorized = 3,
    InvalidAmount = 4,
    NumericOverflow = 5,
}

// Events
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BonusPaidEvent {
    pub user: Address,
    pub amount: i128,
    pub unpaid: i128,
    pub timestamp: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BonusRateEvent {
    pub old_rate: i128,
    pub new_rate: i128,
    pub timestamp: u64,
}

#[contract]
pub struct BonusRewarder;

#[contractimpl]
impl BonusRewarder {
    /// Initialize a rewarder streaming `bonus_token` to stakers of one engine pool
    pub fn initialize(
        env: Env,
        owner: Address,
        bonus_token: Address,
        stake_token: Address,
        tokens_per_second: i128,
        engine: Address,
        start_time: u64,
    ) -> Result<(), RewarderError> {
        if env.storage().instance().has(&DataKey::Config) {
            return Err(RewarderError::AlreadyInitialized);
        }

        owner.require_auth();

        if !validate_non_negative_amount(tokens_per_second) {
            return Err(RewarderError::InvalidAmount);
        }

        let config = RewarderConfig {
            owner: owner.clone(),
            bonus_token,
            stake_token,
            engine: engine.clone(),
            start_time,
        };

        let pool = RewarderPool {
            acc_token_per_share: 0,
            last_reward_time: env.ledger().timestamp().max(start_time),
            total_staked: 0,
            tokens_per_second,
        };

        env.storage().instance().set(&DataKey::Config, &config);
        env.storage().instance().set(&DataKey::Pool, &pool);

        log!(&env, "Bonus rewarder initialized for engine {} at {} per second", engine, tokens_per_second);

        Ok(())
    }

    /// Settle and pay `user`, then record their new stake as reported by the engine
    pub fn on_stake_change(env: Env, user: Address, new_stake: i128) -> Result<(), RewarderError> {
        let config = Self::get_config(&env)?;
        config.engine.require_auth();

        if !validate_non_negative_amount(new_stake) {
            return Err(RewarderError::InvalidAmount);
        }

        let mut pool = Self::update_pool(&env)?;
        let mut user_info = Self::load_user(&env, &user);

        if user_info.amount > 0 || user_info.unpaid > 0 {
            let pending = Self::accrued(&user_info, pool.acc_token_per_share)?;
            let token_client = token::Client::new(&env, &config.bonus_token);
            let on_hand = token_client.balance(&env.current_contract_address());

            // Truncate to what the rewarder holds; the rest waits for a top-up
            let paid = pending.min(on_hand).max(0);
            if paid > 0 {
                token_client.transfer(&env.current_contract_address(), &user, &paid);
            }
            user_info.unpaid = pending - paid;

            let event = BonusPaidEvent {
                user: user.clone(),
                amount: paid,
                unpaid: user_info.unpaid,
                timestamp: env.ledger().timestamp(),
            };
            env.events().publish((symbol_short!("bonus"),), event);
        }

        pool.total_staked = pool
            .total_staked
            .checked_sub(user_info.amount)
            .and_then(|total| total.checked_add(new_stake))
            .ok_or(RewarderError::NumericOverflow)?;
        user_info.amount = new_stake;
        user_info.reward_debt = Self::debt_for(new_stake, pool.acc_token_per_share)?;

        env.storage().instance().set(&DataKey::Pool, &pool);
        env.storage()
            .persistent()
            .set(&DataKey::UserInfo(user.clone()), &user_info);

        log!(&env, "Bonus stake for {} set to {}", user, new_stake);

        Ok(())
    }

    /// Drop `user`'s stake without paying anything (engine emergency exit)
    pub fn on_forfeit(env: Env, user: Address) -> Result<(), RewarderError> {
        let config = Self::get_config(&env)?;
        config.engine.require_auth();

        let mut pool = Self::update_pool(&env)?;
        let user_info = Self::load_user(&env, &user);

        pool.total_staked = pool
            .total_staked
            .checked_sub(user_info.amount)
            .ok_or(RewarderError::NumericOverflow)?;

        env.storage().instance().set(&DataKey::Pool, &pool);
        env.storage()
            .persistent()
            .remove(&DataKey::UserInfo(user.clone()));

        log!(&env, "Bonus position of {} forfeited ({} staked)", user, user_info.amount);

        Ok(())
    }

    /// Bonus owed to `user` if the pool were settled now (not capped by the balance)
    pub fn pending_bonus(env: Env, user: Address) -> Result<i128, RewarderError> {
        let pool = Self::get_pool(&env)?;
        let simulated = Self::accrue(&pool, env.ledger().timestamp())?;
        let user_info = Self::load_user(&env, &user);

        Self::accrued(&user_info, simulated.acc_token_per_share)
    }

    pub fn bonus_token(env: Env) -> Result<Address, RewarderError> {
        Ok(Self::get_config(&env)?.bonus_token)
    }

    pub fn stake_token(env: Env) -> Result<Address, RewarderError> {
        Ok(Self::get_config(&env)?.stake_token)
    }

    pub fn engine(env: Env) -> Result<Address, RewarderError> {
        Ok(Self::get_config(&env)?.engine)
    }

    pub fn owner(env: Env) -> Result<Address, RewarderError> {
        Ok(Self::get_config(&env)?.owner)
    }

    pub fn reward_rate(env: Env) -> Result<i128, RewarderError> {
        Ok(Self::get_pool(&env)?.tokens_per_second)
    }

    pub fn pool_state(env: Env) -> Result<RewarderPool, RewarderError> {
        Self::get_pool(&env)
    }

    pub fn user_info(env: Env, user: Address) -> UserBonusInfo {
        Self::load_user(&env, &user)
    }

    /// Change the bonus emission rate; time elapsed so far is settled at the old rate
    pub fn set_reward_rate(env: Env, owner: Address, new_rate: i128) -> Result<(), RewarderError> {
        owner.require_auth();

        let config = Self::get_config(&env)?;

        if config.owner != owner {
            return Err(RewarderError::Unauthorized);
        }

        if !validate_non_negative_amount(new_rate) {
            return Err(RewarderError::InvalidAmount);
        }

        let mut pool = Self::update_pool(&env)?;
        let old_rate = pool.tokens_per_second;
        pool.tokens_per_second = new_rate;
        env.storage().instance().set(&DataKey::Pool, &pool);

        let event = BonusRateEvent {
            old_rate,
            new_rate,
            timestamp: env.ledger().timestamp(),
        };
        env.events().publish((symbol_short!("rate"),), event);

        log!(&env, "Bonus rate updated from {} to {}", old_rate, new_rate);

        Ok(())
    }

    /// Return bonus tokens held by the rewarder to the owner
    pub fn reclaim(env: Env, owner: Address, amount: i128) -> Result<(), RewarderError> {
        owner.require_auth();

        let config = Self::get_config(&env)?;

        if config.owner != owner {
            return Err(RewarderError::Unauthorized);
        }

        if !validate_non_negative_amount(amount) {
            return Err(RewarderError::InvalidAmount);
        }

        token::Client::new(&env, &config.bonus_token).transfer(
            &env.current_contract_address(),
            &owner,
            &amount,
        );

        log!(&env, "Owner reclaimed {} bonus tokens", amount);

        Ok(())
    }

    pub fn transfer_ownership(
        env: Env,
        owner: Address,
        new_owner: Address,
    ) -> Result<(), RewarderError> {
        owner.require_auth();

        let mut config = Self::get_config(&env)?;

        if config.owner != owner {
            return Err(RewarderError::Unauthorized);
        }

        config.owner = new_owner.clone();
        env.storage().instance().set(&DataKey::Config, &config);

        log!(&env, "Rewarder ownership transferred to {}", new_owner);

        Ok(())
    }

    // Internal helper functions
    fn get_config(env: &Env) -> Result<RewarderConfig, RewarderError> {
        env.storage()
            .instance()
            .get(&DataKey::Config)
            .ok_or(RewarderError::NotInitialized)
    }

    fn get_pool(env: &Env) -> Result<RewarderPool, RewarderError> {
        env.storage()
            .instance()
            .get(&DataKey::Pool)
            .ok_or(RewarderError::NotInitialized)
    }

    fn load_user(env: &Env, user: &Address) -> UserBonusInfo {
        env.storage()
            .persistent()
            .get(&DataKey::UserInfo(user.clone()))
            .unwrap_or_default()
    }

    fn update_pool(env: &Env) -> Result<RewarderPool, RewarderError> {
        let pool = Self::get_pool(env)?;
        let updated = Self::accrue(&pool, env.ledger().timestamp())?;
        if updated != pool {
            env.storage().instance().set(&DataKey::Pool, &updated);
        }
        Ok(updated)
    }

    /// Pool state as of `now`. Time with nothing staked accrues nothing.
    fn accrue(pool: &RewarderPool, now: u64) -> Result<RewarderPool, RewarderError> {
        let mut next = pool.clone();
        if now <= pool.last_reward_time {
            return Ok(next);
        }

        if pool.total_staked > 0 {
            let elapsed = (now - pool.last_reward_time) as i128;
            let reward = elapsed
                .checked_mul(pool.tokens_per_second)
                .ok_or(RewarderError::NumericOverflow)?;
            let increment = mul_div_floor(reward, ACC_REWARD_PRECISION, pool.total_staked)
                .ok_or(RewarderError::NumericOverflow)?;
            next.acc_token_per_share = pool
                .acc_token_per_share
                .checked_add(increment)
                .ok_or(RewarderError::NumericOverflow)?;
        }

        next.last_reward_time = now;
        Ok(next)
    }

    fn debt_for(amount: i128, acc_token_per_share: i128) -> Result<i128, RewarderError> {
        mul_div_floor(amount, acc_token_per_share, ACC_REWARD_PRECISION)
            .ok_or(RewarderError::NumericOverflow)
    }

    fn accrued(user_info: &UserBonusInfo, acc_token_per_share: i128) -> Result<i128, RewarderError> {
        Self::debt_for(user_info.amount, acc_token_per_share)?
            .checked_sub(user_info.reward_debt)
            .and_then(|pending| pending.checked_add(user_info.unpaid))
            .ok_or(RewarderError::NumericOverflow)
    }
}
