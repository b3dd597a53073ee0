#![cfg(test)]
use super::*;
use soroban_sdk::{testutils::Address as _, Env, String};

const CAP: i128 = 1_000_000_000;

fn create_token(env: &Env, owner: &Address, cap: i128) -> CappedTokenClient<'static> {
    let contract_id = env.register_contract(None, CappedToken);
    let client = CappedTokenClient::new(env, &contract_id);
    client.initialize(
        owner,
        &7u32,
        &String::from_str(env, "Flow"),
        &String::from_str(env, "FLOW"),
        &cap,
        &0,
    );
    client
}

#[test]
fn test_initialize() {
    let env = Env::default();
    let owner = Address::generate(&env);
    let token = create_token(&env, &owner, CAP);

    assert_eq!(token.owner(), owner);
    assert_eq!(token.cap(), CAP);
    assert_eq!(token.decimals(), 7);
    assert_eq!(token.name(), String::from_str(&env, "Flow"));
    assert_eq!(token.symbol(), String::from_str(&env, "FLOW"));
    assert_eq!(token.total_supply(), 0);
}

#[test]
fn test_initialize_twice_fails() {
    let env = Env::default();
    let owner = Address::generate(&env);
    let token = create_token(&env, &owner, CAP);

    let result = token.try_initialize(
        &owner,
        &7u32,
        &String::from_str(&env, "Flow"),
        &String::from_str(&env, "FLOW"),
        &CAP,
        &0,
    );
    assert_eq!(result, Err(Ok(TokenError::AlreadyInitialized)));
}

#[test]
fn test_only_owner_can_mint() {
    let env = Env::default();
    env.mock_all_auths();
    let owner = Address::generate(&env);
    let alice = Address::generate(&env);
    let bob = Address::generate(&env);
    let token = create_token(&env, &owner, CAP);

    token.mint(&owner, &alice, &100);
    token.mint(&owner, &bob, &1000);

    let result = token.try_mint(&bob, &bob, &1000);
    assert_eq!(result, Err(Ok(TokenError::Unauthorized)));

    assert_eq!(token.total_supply(), 1100);
    assert_eq!(token.balance(&alice), 100);
    assert_eq!(token.balance(&bob), 1000);
}

#[test]
fn test_mint_respects_cap() {
    let env = Env::default();
    env.mock_all_auths();
    let owner = Address::generate(&env);
    let alice = Address::generate(&env);
    let token = create_token(&env, &owner, CAP);

    let result = token.try_mint(&owner, &alice, &(CAP + 1));
    assert_eq!(result, Err(Ok(TokenError::SupplyCapExceeded)));
    assert_eq!(token.total_supply(), 0);

    token.mint(&owner, &alice, &CAP);
    assert_eq!(token.total_supply(), CAP);

    // Burning frees room under the cap again
    token.burn(&alice, &10);
    token.mint(&owner, &alice, &10);
    assert_eq!(token.total_supply(), CAP);
}

#[test]
fn test_transfer() {
    let env = Env::default();
    env.mock_all_auths();
    let owner = Address::generate(&env);
    let alice = Address::generate(&env);
    let bob = Address::generate(&env);
    let carol = Address::generate(&env);
    let token = create_token(&env, &owner, CAP);

    token.mint(&owner, &alice, &100);
    token.mint(&owner, &bob, &1000);
    token.transfer(&alice, &carol, &10);
    token.transfer(&bob, &carol, &100);

    assert_eq!(token.balance(&alice), 90);
    assert_eq!(token.balance(&bob), 900);
    assert_eq!(token.balance(&carol), 110);
    assert_eq!(token.total_supply(), 1100);
}

#[test]
fn test_bad_transfers_fail() {
    let env = Env::default();
    env.mock_all_auths();
    let owner = Address::generate(&env);
    let alice = Address::generate(&env);
    let bob = Address::generate(&env);
    let token = create_token(&env, &owner, CAP);

    token.mint(&owner, &alice, &100);

    let result = token.try_transfer(&alice, &bob, &101);
    assert_eq!(result, Err(Ok(TokenError::InsufficientBalance)));

    let result = token.try_transfer(&bob, &alice, &1);
    assert_eq!(result, Err(Ok(TokenError::InsufficientBalance)));

    let result = token.try_transfer(&alice, &bob, &-1);
    assert_eq!(result, Err(Ok(TokenError::InvalidAmount)));

    assert_eq!(token.balance(&alice), 100);
}

#[test]
fn test_approve_and_transfer_from() {
    let env = Env::default();
    env.mock_all_auths();
    let owner = Address::generate(&env);
    let alice = Address::generate(&env);
    let spender = Address::generate(&env);
    let bob = Address::generate(&env);
    let token = create_token(&env, &owner, CAP);

    token.mint(&owner, &alice, &100);

    let result = token.try_transfer_from(&spender, &alice, &bob, &10);
    assert_eq!(result, Err(Ok(TokenError::InsufficientAllowance)));

    token.approve(&alice, &spender, &50, &1000);
    assert_eq!(token.allowance(&alice, &spender), 50);

    token.transfer_from(&spender, &alice, &bob, &30);
    assert_eq!(token.allowance(&alice, &spender), 20);
    assert_eq!(token.balance(&alice), 70);
    assert_eq!(token.balance(&bob), 30);

    let result = token.try_transfer_from(&spender, &alice, &bob, &21);
    assert_eq!(result, Err(Ok(TokenError::InsufficientAllowance)));

    token.burn_from(&spender, &alice, &20);
    assert_eq!(token.allowance(&alice, &spender), 0);
    assert_eq!(token.balance(&alice), 50);
    assert_eq!(token.total_supply(), 80);
}

#[test]
fn test_burn_more_than_balance_fails() {
    let env = Env::default();
    env.mock_all_auths();
    let owner = Address::generate(&env);
    let alice = Address::generate(&env);
    let token = create_token(&env, &owner, CAP);

    token.mint(&owner, &alice, &100);

    let result = token.try_burn(&alice, &200);
    assert_eq!(result, Err(Ok(TokenError::InsufficientBalance)));
    assert_eq!(token.total_supply(), 100);
}

#[test]
fn test_set_owner() {
    let env = Env::default();
    env.mock_all_auths();
    let owner = Address::generate(&env);
    let new_owner = Address::generate(&env);
    let alice = Address::generate(&env);
    let token = create_token(&env, &owner, CAP);

    let result = token.try_set_owner(&alice, &alice);
    assert_eq!(result, Err(Ok(TokenError::Unauthorized)));

    token.set_owner(&owner, &new_owner);
    assert_eq!(token.owner(), new_owner);

    let result = token.try_mint(&owner, &alice, &1);
    assert_eq!(result, Err(Ok(TokenError::Unauthorized)));
    token.mint(&new_owner, &alice, &1);
    assert_eq!(token.balance(&alice), 1);
}

#[test]
fn test_initial_supply_minted_to_owner() {
    let env = Env::default();
    env.mock_all_auths();
    let owner = Address::generate(&env);
    let alice = Address::generate(&env);

    let contract_id = env.register_contract(None, CappedToken);
    let token = CappedTokenClient::new(&env, &contract_id);
    token.initialize(
        &owner,
        &7u32,
        &String::from_str(&env, "Flow"),
        &String::from_str(&env, "FLOW"),
        &1000,
        &430,
    );

    assert_eq!(token.balance(&owner), 430);
    assert_eq!(token.total_supply(), 430);

    // The pre-mint counts against the cap
    let result = token.try_mint(&owner, &alice, &571);
    assert_eq!(result, Err(Ok(TokenError::SupplyCapExceeded)));
    token.mint(&owner, &alice, &570);
    assert_eq!(token.total_supply(), 1000);
}

#[test]
fn test_initial_supply_bounds() {
    let env = Env::default();
    let owner = Address::generate(&env);

    for (initial_supply, expected) in [
        (1001i128, TokenError::SupplyCapExceeded),
        (-1, TokenError::InvalidAmount),
    ] {
        let contract_id = env.register_contract(None, CappedToken);
        let token = CappedTokenClient::new(&env, &contract_id);
        let result = token.try_initialize(
            &owner,
            &7u32,
            &String::from_str(&env, "Flow"),
            &String::from_str(&env, "FLOW"),
            &1000,
            &initial_supply,
        );
        assert_eq!(result, Err(Ok(expected)));
    }
}
