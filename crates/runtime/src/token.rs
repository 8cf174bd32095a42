//! `basic`: the built-in fungible-token chaincode.
//!
//! State layout:
//! - `totalSupply`          total minted amount
//! - `balance:<account>`    per-account balance
//!
//! Amounts are decimal strings; arithmetic is checked so balances can never
//! wrap.

use crate::{Chaincode, ChaincodeError, ExecutionContext};

pub struct TokenChaincode;

const TOTAL_SUPPLY_KEY: &str = "totalSupply";

fn balance_key(account: &str) -> String {
    format!("balance:{}", account)
}

fn parse_amount(raw: &str) -> Result<u64, ChaincodeError> {
    raw.parse::<u64>()
        .map_err(|_| ChaincodeError::BadArgs(format!("amount {raw:?} is not a whole number")))
}

fn read_number(
    ctx: &mut ExecutionContext<'_>,
    key: &str,
) -> Result<u64, ChaincodeError> {
    match ctx.get_state(key)? {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| ChaincodeError::Execution(format!("corrupt number under {key:?}"))),
        None => Ok(0),
    }
}

impl TokenChaincode {
    fn mint(
        &self,
        ctx: &mut ExecutionContext<'_>,
        args: &[String],
    ) -> Result<Option<String>, ChaincodeError> {
        let [amount, to] = args else {
            return Err(ChaincodeError::BadArgs(
                "mint expects (amount, to)".to_string(),
            ));
        };
        let amount = parse_amount(amount)?;
        let balance = read_number(ctx, &balance_key(to))?;
        let supply = read_number(ctx, TOTAL_SUPPLY_KEY)?;
        let new_balance = balance
            .checked_add(amount)
            .ok_or_else(|| ChaincodeError::Execution("balance overflow".to_string()))?;
        let new_supply = supply
            .checked_add(amount)
            .ok_or_else(|| ChaincodeError::Execution("total supply overflow".to_string()))?;
        ctx.put_state(&balance_key(to), &new_balance.to_string());
        ctx.put_state(TOTAL_SUPPLY_KEY, &new_supply.to_string());
        Ok(Some(new_balance.to_string()))
    }

    fn transfer(
        &self,
        ctx: &mut ExecutionContext<'_>,
        args: &[String],
    ) -> Result<Option<String>, ChaincodeError> {
        let [from, to, amount] = args else {
            return Err(ChaincodeError::BadArgs(
                "transfer expects (from, to, amount)".to_string(),
            ));
        };
        let amount = parse_amount(amount)?;
        let from_balance = read_number(ctx, &balance_key(from))?;
        if from_balance < amount {
            return Err(ChaincodeError::Execution(format!(
                "insufficient balance: {from} holds {from_balance}, needs {amount}"
            )));
        }
        let to_balance = read_number(ctx, &balance_key(to))?;
        let new_to = to_balance
            .checked_add(amount)
            .ok_or_else(|| ChaincodeError::Execution("balance overflow".to_string()))?;
        ctx.put_state(&balance_key(from), &(from_balance - amount).to_string());
        ctx.put_state(&balance_key(to), &new_to.to_string());
        Ok(Some((from_balance - amount).to_string()))
    }

    fn balance(
        &self,
        ctx: &mut ExecutionContext<'_>,
        args: &[String],
    ) -> Result<Option<String>, ChaincodeError> {
        let [account] = args else {
            return Err(ChaincodeError::BadArgs(
                "balance expects (account)".to_string(),
            ));
        };
        let balance = read_number(ctx, &balance_key(account))?;
        Ok(Some(balance.to_string()))
    }
}

impl Chaincode for TokenChaincode {
    fn init(
        &self,
        ctx: &mut ExecutionContext<'_>,
        _args: &[String],
    ) -> Result<Option<String>, ChaincodeError> {
        ctx.put_state(TOTAL_SUPPLY_KEY, "0");
        Ok(None)
    }

    fn invoke(
        &self,
        ctx: &mut ExecutionContext<'_>,
        function: &str,
        args: &[String],
    ) -> Result<Option<String>, ChaincodeError> {
        match function {
            "mint" => self.mint(ctx, args),
            "transfer" => self.transfer(ctx, args),
            "balance" => self.balance(ctx, args),
            other => Err(ChaincodeError::UnknownFunction(other.to_string())),
        }
    }
}
