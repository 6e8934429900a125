pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const GENESIS_HEIGHT: u64 = 0;
/// Fixed sentinel body for block 0, agreed by every reader of a chain.
pub const GENESIS_BODY: &str = "chain genesis block";
