#![no_std]
use flowfarm_shared::{mul_div_floor, validate_positive_amount};
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, log, symbol_short, token, Address, Env,
};

// Data Types
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VestingConfig {
    pub owner: Address,
    pub token: Address,
    pub recipient: Address,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Schedule {
    pub total_amount: i128,
    pub begin: u64,
    pub cliff: u64,
    pub end: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VestingProgress {
    pub last_update: u64, // Point in time up to which vesting has been paid out
    pub released: i128,
}

// Storage Keys
#[contracttype]
pub enum DataKey {
    Config,
    Schedule,
    Progress,
}

// Error Types
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum VestingError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    Unauthorized = 3,
    InvalidSchedule = 4,
    NotYetClaimable = 5,
    NumericOverflow = 6,
}

// Events
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClaimEvent {
    pub recipient: Address,
    pub amount: i128,
    pub released: i128,
    pub last_update: u64,
    pub timestamp: u64,
}

#[contract]
pub struct VestingSchedule;

#[contractimpl]
impl VestingSchedule {
    /// Set up a linear release of `total_amount` between `begin` and `end`,
    /// claimable from `cliff` on. The contract can be funded at any time.
    pub fn initialize(
        env: Env,
        owner: Address,
        token: Address,
        recipient: Address,
        total_amount: i128,
        begin: u64,
        cliff: u64,
        end: u64,
    ) -> Result<(), VestingError> {
        if env.storage().instance().has(&DataKey::Config) {
            return Err(VestingError::AlreadyInitialized);
        }

        owner.require_auth();

        if !validate_positive_amount(total_amount) || begin > cliff || cliff > end || begin >= end
        {
            return Err(VestingError::InvalidSchedule);
        }

        let config = VestingConfig {
            owner,
            token,
            recipient: recipient.clone(),
        };
        let schedule = Schedule {
            total_amount,
            begin,
            cliff,
            end,
        };
        let progress = VestingProgress {
            last_update: begin,
            released: 0,
        };

        env.storage().instance().set(&DataKey::Config, &config);
        env.storage().instance().set(&DataKey::Schedule, &schedule);
        env.storage().instance().set(&DataKey::Progress, &progress);

        log!(&env, "Vesting {} to {} from {} to {}", total_amount, recipient, begin, end);

        Ok(())
    }

    /// Pay the recipient everything vested since the last claim, as far as the
    /// contract's balance allows. Anyone may trigger it.
    pub fn claim(env: Env) -> Result<i128, VestingError> {
        let config = Self::get_config(&env)?;
        let schedule = Self::get_schedule(&env)?;
        let mut progress = Self::get_progress(&env)?;
        let now = env.ledger().timestamp();

        if now < schedule.cliff {
            return Err(VestingError::NotYetClaimable);
        }

        let entitled = Self::vested_at(&schedule, now)?
            .checked_sub(progress.released)
            .ok_or(VestingError::NumericOverflow)?;

        if entitled <= 0 {
            return Ok(0);
        }

        let token_client = token::Client::new(&env, &config.token);
        let on_hand = token_client.balance(&env.current_contract_address());
        let paid = entitled.min(on_hand);

        if paid <= 0 {
            return Ok(0);
        }

        progress.released = progress
            .released
            .checked_add(paid)
            .ok_or(VestingError::NumericOverflow)?;

        progress.last_update = if paid == entitled {
            now.min(schedule.end)
        } else {
            // Only the funded part of the elapsed time counts as vested out
            let span = (schedule.end - schedule.begin) as i128;
            let covered = mul_div_floor(progress.released, span, schedule.total_amount)
                .ok_or(VestingError::NumericOverflow)?;
            progress.last_update.max(schedule.begin + covered as u64)
        };
        env.storage().instance().set(&DataKey::Progress, &progress);

        token_client.transfer(&env.current_contract_address(), &config.recipient, &paid);

        let event = ClaimEvent {
            recipient: config.recipient.clone(),
            amount: paid,
            released: progress.released,
            last_update: progress.last_update,
            timestamp: now,
        };
        env.events().publish((symbol_short!("claim"),), event);

        log!(&env, "Released {} to {}", paid, config.recipient);

        Ok(paid)
    }

    pub fn set_recipient(env: Env, owner: Address, recipient: Address) -> Result<(), VestingError> {
        owner.require_auth();

        let mut config = Self::get_config(&env)?;

        if config.owner != owner {
            return Err(VestingError::Unauthorized);
        }

        config.recipient = recipient.clone();
        env.storage().instance().set(&DataKey::Config, &config);

        log!(&env, "Vesting recipient set to {}", recipient);

        Ok(())
    }

    pub fn transfer_ownership(
        env: Env,
        owner: Address,
        new_owner: Address,
    ) -> Result<(), VestingError> {
        owner.require_auth();

        let mut config = Self::get_config(&env)?;

        if config.owner != owner {
            return Err(VestingError::Unauthorized);
        }

        config.owner = new_owner.clone();
        env.storage().instance().set(&DataKey::Config, &config);

        log!(&env, "Vesting ownership transferred to {}", new_owner);

        Ok(())
    }

    pub fn recipient(env: Env) -> Result<Address, VestingError> {
        Ok(Self::get_config(&env)?.recipient)
    }

    pub fn owner(env: Env) -> Result<Address, VestingError> {
        Ok(Self::get_config(&env)?.owner)
    }

    pub fn token(env: Env) -> Result<Address, VestingError> {
        Ok(Self::get_config(&env)?.token)
    }

    pub fn schedule(env: Env) -> Result<Schedule, VestingError> {
        Self::get_schedule(&env)
    }

    pub fn last_update(env: Env) -> Result<u64, VestingError> {
        Ok(Self::get_progress(&env)?.last_update)
    }

    pub fn released(env: Env) -> Result<i128, VestingError> {
        Ok(Self::get_progress(&env)?.released)
    }

    // Internal helper functions

    /// Cumulative amount the schedule has released by `now`, rounded down
    fn vested_at(schedule: &Schedule, now: u64) -> Result<i128, VestingError> {
        if now >= schedule.end {
            return Ok(schedule.total_amount);
        }
        let elapsed = now.saturating_sub(schedule.begin) as i128;
        let span = (schedule.end - schedule.begin) as i128;
        mul_div_floor(schedule.total_amount, elapsed, span).ok_or(VestingError::NumericOverflow)
    }

    fn get_config(env: &Env) -> Result<VestingConfig, VestingError> {
        env.storage()
            .instance()
            .get(&DataKey::Config)
            .ok_or(VestingError::NotInitialized)
    }

    fn get_schedule(env: &Env) -> Result<Schedule, VestingError> {
        env.storage()
            .instance()
            .get(&DataKey::Schedule)
            .ok_or(VestingError::NotInitialized)
    }

    fn get_progress(env: &Env) -> Result<VestingProgress, VestingError> {
        env.storage()
            .instance()
            .get(&DataKey::Progress)
            .ok_or(VestingError::NotInitialized)
    }
}
