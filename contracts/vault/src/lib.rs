#![no_std]
use flowfarm_shared::{mul_div_floor, validate_positive_amount, MintableTokenClient};
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, log, symbol_short, token, Address, Env,
};

// Data Types
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VaultConfig {
    pub base_token: Address,
    pub share_token: Address, // Minted and burned by the vault, which must own it
}

// Storage Keys
#[contracttype]
pub enum DataKey {
    Config,
}

// Error Types
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum VaultError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    InvalidAmount = 3,
    InsufficientShares = 4,
    NumericOverflow = 5,
}

// Events
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VaultEvent {
    pub user: Address,
    pub base_amount: i128,
    pub shares: i128,
    pub timestamp: u64,
}

#[contract]
pub struct ShareVault;

#[contractimpl]
impl ShareVault {
    pub fn initialize(env: Env, base_token: Address, share_token: Address) -> Result<(), VaultError> {
        if env.storage().instance().has(&DataKey::Config) {
            return Err(VaultError::AlreadyInitialized);
        }

        let config = VaultConfig {
            base_token: base_token.clone(),
            share_token,
        };
        env.storage().instance().set(&DataKey::Config, &config);

        log!(&env, "Share vault initialized over {}", base_token);

        Ok(())
    }

    /// Lock `amount` of the base token and mint the proportional number of shares.
    ///
    /// The rate uses the balance held before this deposit lands, so tokens sent
    /// to the vault directly raise the value of every existing share.
    pub fn enter(env: Env, user: Address, amount: i128) -> Result<i128, VaultError> {
        user.require_auth();

        let config = Self::get_config(&env)?;

        if !validate_positive_amount(amount) {
            return Err(VaultError::InvalidAmount);
        }

        let shares = Self::shares_for(&env, &config, amount)?;
        if shares == 0 {
            return Err(VaultError::InvalidAmount);
        }

        let vault = env.current_contract_address();
        token::Client::new(&env, &config.base_token).transfer(&user, &vault, &amount);
        MintableTokenClient::new(&env, &config.share_token).mint(&vault, &user, &shares);

        let event = VaultEvent {
            user: user.clone(),
            base_amount: amount,
            shares,
            timestamp: env.ledger().timestamp(),
        };
        env.events().publish((symbol_short!("enter"),), event);

        log!(&env, "User {} entered with {} for {} shares", user, amount, shares);

        Ok(shares)
    }

    /// Burn `share_amount` shares and return their slice of the base token
    pub fn leave(env: Env, user: Address, share_amount: i128) -> Result<i128, VaultError> {
        user.require_auth();

        let config = Self::get_config(&env)?;

        if !validate_positive_amount(share_amount) {
            return Err(VaultError::InvalidAmount);
        }

        let shares = MintableTokenClient::new(&env, &config.share_token);
        if shares.balance(&user) < share_amount {
            return Err(VaultError::InsufficientShares);
        }

        let base_out = Self::base_for(&env, &config, share_amount)?;

        shares.burn(&user, &share_amount);
        if base_out > 0 {
            token::Client::new(&env, &config.base_token).transfer(
                &env.current_contract_address(),
                &user,
                &base_out,
            );
        }

        let event = VaultEvent {
            user: user.clone(),
            base_amount: base_out,
            shares: share_amount,
            timestamp: env.ledger().timestamp(),
        };
        env.events().publish((symbol_short!("leave"),), event);

        log!(&env, "User {} left with {} for {} shares", user, base_out, share_amount);

        Ok(base_out)
    }

    pub fn total_shares(env: Env) -> Result<i128, VaultError> {
        let config = Self::get_config(&env)?;
        Ok(MintableTokenClient::new(&env, &config.share_token).total_supply())
    }

    pub fn total_base(env: Env) -> Result<i128, VaultError> {
        let config = Self::get_config(&env)?;
        Ok(token::Client::new(&env, &config.base_token).balance(&env.current_contract_address()))
    }

    /// Shares `enter(amount)` would mint right now
    pub fn preview_enter(env: Env, amount: i128) -> Result<i128, VaultError> {
        let config = Self::get_config(&env)?;
        if !validate_positive_amount(amount) {
            return Err(VaultError::InvalidAmount);
        }
        Self::shares_for(&env, &config, amount)
    }

    /// Base tokens `leave(share_amount)` would return right now
    pub fn preview_leave(env: Env, share_amount: i128) -> Result<i128, VaultError> {
        let config = Self::get_config(&env)?;
        if !validate_positive_amount(share_amount) {
            return Err(VaultError::InvalidAmount);
        }
        Self::base_for(&env, &config, share_amount)
    }

    pub fn base_token(env: Env) -> Result<Address, VaultError> {
        Ok(Self::get_config(&env)?.base_token)
    }

    pub fn share_token(env: Env) -> Result<Address, VaultError> {
        Ok(Self::get_config(&env)?.share_token)
    }

    // Internal helper functions
    fn get_config(env: &Env) -> Result<VaultConfig, VaultError> {
        env.storage()
            .instance()
            .get(&DataKey::Config)
            .ok_or(VaultError::NotInitialized)
    }

    fn totals(env: &Env, config: &VaultConfig) -> (i128, i128) {
        let total_shares = MintableTokenClient::new(env, &config.share_token).total_supply();
        let total_base =
            token::Client::new(env, &config.base_token).balance(&env.current_contract_address());
        (total_shares, total_base)
    }

    // An empty vault (no shares, or nothing held) enters at 1:1
    fn shares_for(env: &Env, config: &VaultConfig, amount: i128) -> Result<i128, VaultError> {
        let (total_shares, total_base) = Self::totals(env, config);
        if total_shares == 0 || total_base == 0 {
            return Ok(amount);
        }
        mul_div_floor(amount, total_shares, total_base).ok_or(VaultError::NumericOverflow)
    }

    fn base_for(env: &Env, config: &VaultConfig, share_amount: i128) -> Result<i128, VaultError> {
        let (total_shares, total_base) = Self::totals(env, config);
        if total_shares == 0 {
            return Ok(0);
        }
        mul_div_floor(share_amount, total_base, total_shares).ok_or(VaultError::NumericOverflow)
    }
}
