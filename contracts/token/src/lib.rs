#![no_std]
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, log, symbol_short, Address, Env, String,
};

// Data Types
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TokenConfig {
    pub owner: Address,
    pub decimals: u32,
    pub name: String,
    pub symbol: String,
    pub cap: i128, // Hard ceiling on total supply
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AllowanceValue {
    pub amount: i128,
    pub expiration_ledger: u32,
}

// Storage Keys
#[contracttype]
pub enum DataKey {
    Config,
    TotalSupply,
    Balance(Address),
    Allowance(Address, Address), // from, spender
}

// Error Types
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum TokenError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    Unauthorized = 3,
    InvalidAmount = 4,
    InsufficientBalance = 5,
    InsufficientAllowance = 6,
    SupplyCapExceeded = 7,
    InvalidExpiration = 8,
    NumericOverflow = 9,
}

// Events
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MintEvent {
    pub to: Address,
    pub amount: i128,
    pub total_supply: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BurnEvent {
    pub from: Address,
    pub amount: i128,
    pub total_supply: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransferEvent {
    pub from: Address,
    pub to: Address,
    pub amount: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApproveEvent {
    pub from: Address,
    pub spender: Address,
    pub amount: i128,
    pub expiration_ledger: u32,
}

#[contract]
pub struct CappedToken;

#[contractimpl]
impl CappedToken {
    /// Initialize the token with its owner (the sole minter) and supply cap.
    /// `initial_supply` is minted to the owner straight away and counts
    /// against the cap.
    pub fn initialize(
        env: Env,
        owner: Address,
        decimals: u32,
        name: String,
        symbol: String,
        cap: i128,
        initial_supply: i128,
    ) -> Result<(), TokenError> {
        if env.storage().instance().has(&DataKey::Config) {
            return Err(TokenError::AlreadyInitialized);
        }

        if cap <= 0 {
            return Err(TokenError::InvalidAmount);
        }

        Self::check_amount(initial_supply)?;
        if initial_supply > cap {
            return Err(TokenError::SupplyCapExceeded);
        }

        let config = TokenConfig {
            owner: owner.clone(),
            decimals,
            name,
            symbol,
            cap,
        };

        env.storage().instance().set(&DataKey::Config, &config);
        env.storage().instance().set(&DataKey::TotalSupply, &initial_supply);

        if initial_supply > 0 {
            Self::credit(&env, &owner, initial_supply)?;

            let event = MintEvent {
                to: owner.clone(),
                amount: initial_supply,
                total_supply: initial_supply,
            };
            env.events().publish((symbol_short!("mint"),), event);
        }

        log!(&env, "Token initialized with owner {} and cap {}", owner, cap);

        Ok(())
    }

    /// Mint new tokens (owner only, bounded by the cap)
    pub fn mint(env: Env, caller: Address, to: Address, amount: i128) -> Result<(), TokenError> {
        caller.require_auth();

        let config = Self::get_config(&env)?;

        if config.owner != caller {
            return Err(TokenError::Unauthorized);
        }

        Self::check_amount(amount)?;

        let supply = Self::total_supply(env.clone());
        let new_supply = supply.checked_add(amount).ok_or(TokenError::NumericOverflow)?;
        if new_supply > config.cap {
            return Err(TokenError::SupplyCapExceeded);
        }

        Self::credit(&env, &to, amount)?;
        env.storage().instance().set(&DataKey::TotalSupply, &new_supply);

        let event = MintEvent {
            to: to.clone(),
            amount,
            total_supply: new_supply,
        };
        env.events().publish((symbol_short!("mint"),), event);

        log!(&env, "Minted {} to {}", amount, to);

        Ok(())
    }

    /// Burn tokens held by `from`
    pub fn burn(env: Env, from: Address, amount: i128) -> Result<(), TokenError> {
        from.require_auth();
        Self::get_config(&env)?;
        Self::check_amount(amount)?;

        Self::burn_balance(&env, &from, amount)
    }

    /// Burn tokens held by `from` against `spender`'s allowance
    pub fn burn_from(
        env: Env,
        spender: Address,
        from: Address,
        amount: i128,
    ) -> Result<(), TokenError> {
        spender.require_auth();
        Self::get_config(&env)?;
        Self::check_amount(amount)?;

        Self::spend_allowance(&env, &from, &spender, amount)?;
        Self::burn_balance(&env, &from, amount)
    }

    pub fn transfer(env: Env, from: Address, to: Address, amount: i128) -> Result<(), TokenError> {
        from.require_auth();
        Self::get_config(&env)?;
        Self::check_amount(amount)?;

        Self::move_balance(&env, &from, &to, amount)
    }

    pub fn transfer_from(
        env: Env,
        spender: Address,
        from: Address,
        to: Address,
        amount: i128,
    ) -> Result<(), TokenError> {
        spender.require_auth();
        Self::get_config(&env)?;
        Self::check_amount(amount)?;

        Self::spend_allowance(&env, &from, &spender, amount)?;
        Self::move_balance(&env, &from, &to, amount)
    }

    /// Let `spender` move up to `amount` of `from`'s tokens until `expiration_ledger`
    pub fn approve(
        env: Env,
        from: Address,
        spender: Address,
        amount: i128,
        expiration_ledger: u32,
    ) -> Result<(), TokenError> {
        from.require_auth();
        Self::get_config(&env)?;
        Self::check_amount(amount)?;

        if amount > 0 && expiration_ledger < env.ledger().sequence() {
            return Err(TokenError::InvalidExpiration);
        }

        let allowance = AllowanceValue {
            amount,
            expiration_ledger,
        };
        env.storage()
            .persistent()
            .set(&DataKey::Allowance(from.clone(), spender.clone()), &allowance);

        let event = ApproveEvent {
            from,
            spender,
            amount,
            expiration_ledger,
        };
        env.events().publish((symbol_short!("approve"),), event);

        Ok(())
    }

    pub fn allowance(env: Env, from: Address, spender: Address) -> i128 {
        let allowance: Option<AllowanceValue> = env
            .storage()
            .persistent()
            .get(&DataKey::Allowance(from, spender));

        match allowance {
            Some(value) if value.expiration_ledger >= env.ledger().sequence() => value.amount,
            _ => 0,
        }
    }

    pub fn balance(env: Env, id: Address) -> i128 {
        env.storage().persistent().get(&DataKey::Balance(id)).unwrap_or(0)
    }

    pub fn total_supply(env: Env) -> i128 {
        env.storage().instance().get(&DataKey::TotalSupply).unwrap_or(0)
    }

    pub fn cap(env: Env) -> Result<i128, TokenError> {
        Ok(Self::get_config(&env)?.cap)
    }

    pub fn decimals(env: Env) -> Result<u32, TokenError> {
        Ok(Self::get_config(&env)?.decimals)
    }

    pub fn name(env: Env) -> Result<String, TokenError> {
        Ok(Self::get_config(&env)?.name)
    }

    pub fn symbol(env: Env) -> Result<String, TokenError> {
        Ok(Self::get_config(&env)?.symbol)
    }

    pub fn owner(env: Env) -> Result<Address, TokenError> {
        Ok(Self::get_config(&env)?.owner)
    }

    /// Hand mint authority to a new owner (one step, effective immediately)
    pub fn set_owner(env: Env, owner: Address, new_owner: Address) -> Result<(), TokenError> {
        owner.require_auth();

        let mut config = Self::get_config(&env)?;

        if config.owner != owner {
            return Err(TokenError::Unauthorized);
        }

        config.owner = new_owner.clone();
        env.storage().instance().set(&DataKey::Config, &config);

        log!(&env, "Token ownership transferred from {} to {}", owner, new_owner);

        Ok(())
    }

    // Internal helper functions
    fn get_config(env: &Env) -> Result<TokenConfig, TokenError> {
        env.storage()
            .instance()
            .get(&DataKey::Config)
            .ok_or(TokenError::NotInitialized)
    }

    fn check_amount(amount: i128) -> Result<(), TokenError> {
        if amount < 0 {
            return Err(TokenError::InvalidAmount);
        }
        Ok(())
    }

    fn credit(env: &Env, id: &Address, amount: i128) -> Result<(), TokenError> {
        let balance = Self::balance(env.clone(), id.clone());
        let new_balance = balance.checked_add(amount).ok_or(TokenError::NumericOverflow)?;
        env.storage()
            .persistent()
            .set(&DataKey::Balance(id.clone()), &new_balance);
        Ok(())
    }

    fn debit(env: &Env, id: &Address, amount: i128) -> Result<(), TokenError> {
        let balance = Self::balance(env.clone(), id.clone());
        if balance < amount {
            return Err(TokenError::InsufficientBalance);
        }
        env.storage()
            .persistent()
            .set(&DataKey::Balance(id.clone()), &(balance - amount));
        Ok(())
    }

    fn move_balance(env: &Env, from: &Address, to: &Address, amount: i128) -> Result<(), TokenError> {
        Self::debit(env, from, amount)?;
        Self::credit(env, to, amount)?;

        let event = TransferEvent {
            from: from.clone(),
            to: to.clone(),
            amount,
        };
        env.events().publish((symbol_short!("transfer"),), event);

        Ok(())
    }

    fn burn_balance(env: &Env, from: &Address, amount: i128) -> Result<(), TokenError> {
        Self::debit(env, from, amount)?;

        let supply = Self::total_supply(env.clone());
        let new_supply = supply - amount;
        env.storage().instance().set(&DataKey::TotalSupply, &new_supply);

        let event = BurnEvent {
            from: from.clone(),
            amount,
            total_supply: new_supply,
        };
        env.events().publish((symbol_short!("burn"),), event);

        log!(env, "Burned {} from {}", amount, from);

        Ok(())
    }

    fn spend_allowance(
        env: &Env,
        from: &Address,
        spender: &Address,
        amount: i128,
    ) -> Result<(), TokenError> {
        let available = Self::allowance(env.clone(), from.clone(), spender.clone());
        if available < amount {
            return Err(TokenError::InsufficientAllowance);
        }

        if amount > 0 {
            let key = DataKey::Allowance(from.clone(), spender.clone());
            let mut allowance: AllowanceValue = env
                .storage()
                .persistent()
                .get(&key)
                .ok_or(TokenError::InsufficientAllowance)?;
            allowance.amount = available - amount;
            env.storage().persistent().set(&key, &allowance);
        }

        Ok(())
    }
}

#[cfg(test)]
mod test;
