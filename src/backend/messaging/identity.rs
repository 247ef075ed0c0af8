//! Identity Resolver
//!
//! Derives the conversation id of a direct conversation from its two
//! participants. The id is `min(a, b) + "_" + max(a, b)`; account ids may not
//! contain the separator, so distinct pairs never collide.

use crate::backend::error::BackendError;

/// Joins the two participants of a direct conversation id
pub const PAIR_SEPARATOR: char = '_';

/// Separates a room prefix from its subject (`conv:<id>`)
pub const ROOM_SEPARATOR: char = ':';

/// Check that an account id can take part in a derived conversation id
pub fn validate_account_id(account_id: &str) -> Result<(), BackendError> {
    if account_id.is_empty() {
        return Err(BackendError::invalid_argument("account id cannot be empty"));
    }
    if account_id.contains(PAIR_SEPARATOR) || account_id.contains(ROOM_SEPARATOR) {
        return Err(BackendError::invalid_argument(format!(
            "account id '{}' contains a reserved character",
            account_id
        )));
    }
    Ok(())
}

/// Derive the direct conversation id for a pair of accounts
///
/// Commutative in its arguments. Sending to oneself has no derived
/// conversation and is rejected.
pub fn resolve(account_a: &str, account_b: &str) -> Result<String, BackendError> {
    validate_account_id(account_a)?;
    validate_account_id(account_b)?;
    if account_a == account_b {
        return Err(BackendError::invalid_argument(
            "cannot start a conversation with yourself",
        ));
    }

    let (low, high) = if account_a < account_b {
        (account_a, account_b)
    } else {
        (account_b, account_a)
    };
    Ok(format!("{}{}{}", low, PAIR_SEPARATOR, high))
}

/// Whether `account_id` is one of the two accounts a direct id was derived from
pub fn is_direct_member(conversation_id: &str, account_id: &str) -> bool {
    match conversation_id.split_once(PAIR_SEPARATOR) {
        Some((low, high)) => {
            !high.contains(PAIR_SEPARATOR) && (low == account_id || high == account_id)
        }
        None => false,
    }
}
