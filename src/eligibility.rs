use crate::abi::Address;

/// Client-side mirror of the contract's one-play-per-block rule.
///
/// Only used to enable or disable the play action; the contract performs the
/// authoritative check.
pub fn eligible(
    account: Option<&Address>,
    last_played_block: u64,
    current_block: u64,
) -> bool {
    if account.is_none() {
        return false;
    }
    last_played_block == 0 || last_played_block < current_block
}
