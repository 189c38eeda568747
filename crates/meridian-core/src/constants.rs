//! Protocol constants. All monetary values in satoshis (1 MER = 10^8 satoshis).

pub const COIN: u64 = 100_000_000;
pub const MAX_MONEY: u64 = 1_000_000_000 * COIN;

pub const MAGIC_BYTES: [u8; 4] = [0x4D, 0x45, 0x52, 0x44]; // "MERD"
pub const ADDRESS_PREFIX: &str = "mer1";

pub const BLOCK_TIME_SECS: u64 = 60;
pub const DIFFICULTY_WINDOW: u64 = 60;
pub const DEFAULT_P2P_PORT: u16 = 9333;
pub const DEFAULT_RPC_PORT: u16 = 9332;

pub const MAX_BLOCK_SIZE: usize = 2_000_000;
pub const MAX_BLOCK_SIGOPS: usize = 20_000;
pub const MAX_TX_SIZE: usize = 200_000;
pub const MAX_INPUTS: usize = 2_000;
pub const MAX_OUTPUTS: usize = 2_000;
pub const COINBASE_MATURITY: u64 = 100;
pub const MAX_COINBASE_DATA: usize = 100;
pub const MAX_FUTURE_BLOCK_TIME: u64 = 2 * 60 * 60;
pub const LOCKTIME_THRESHOLD: u64 = 500_000_000;
pub const MIN_TX_FEE: u64 = 1_000;

/// Number of past blocks used to compute median-time-past for timestamp checks.
pub const MEDIAN_TIME_SPAN: usize = 11;

// --- Proof of stake kernel (component D) ---

/// Width of the geometrically shrinking stake-modifier selection window, in
/// multiples of `MODIFIER_INTERVAL`.
pub const MODIFIER_INTERVAL: u64 = 10 * 60;
/// Number of shrinking sections summed to build the modifier selection
/// window (`k = 0..STAKE_MODIFIER_SECTIONS`).
pub const STAKE_MODIFIER_SECTIONS: u64 = 64;
/// Minimum coin age, in seconds, before an output becomes stakeable.
pub const STAKE_MIN_AGE: u64 = 60 * 60;
/// Upper bound on the kernel time-weight window (7 days minus one hour).
pub const STAKE_MAX_AGE_WEIGHT: u64 = 7 * 86_400 - 3_600;
/// Divisor applied to `value * timeWeight / COIN` in the kernel target scale.
pub const STAKE_TARGET_SPACING_DIVISOR: u64 = 400;

// --- BIP9-style deployment activation (component I) ---

pub const MAX_VERSION_BITS_DEPLOYMENTS: usize = 29;
pub const VERSIONBITS_TOP_BITS: u32 = 0x2000_0000;
pub const VERSIONBITS_TOP_MASK: u32 = 0xE000_0000;

// --- Subsidy & superblock policy (component J) ---

/// Base block subsidy before the masternode/treasury/charity split.
pub const INITIAL_REWARD: u64 = 50 * COIN;
/// Halving interval, in blocks.
pub const HALVING_INTERVAL: u64 = 210_000;

pub const LEGACY_LOTTERY_CYCLE_BLOCKS: u64 = 43_200;
pub const LEGACY_TREASURY_CYCLE_BLOCKS: u64 = 43_200;
pub const LEGACY_LOTTERY_START_HEIGHT: u64 = 86_400;
pub const LEGACY_TREASURY_START_HEIGHT: u64 = 43_200;
/// Height at which the legacy separate lottery/treasury cycles merge into
/// one unified superblock cycle.
pub const UNIFIED_CYCLE_START_HEIGHT: u64 = 1_036_800;
pub const UNIFIED_CYCLE_BLOCKS: u64 = 43_200;
pub const LOTTERY_WINNER_COUNT: usize = 11;

/// Masternode share of the block subsidy, in basis points (50%).
pub const MASTERNODE_SHARE_BPS: u64 = 5_000;
/// Treasury share of a superblock's superblock-only allocation, in basis
/// points (10% of the superblock cycle's accumulated subsidy).
pub const TREASURY_SHARE_BPS: u64 = 1_000;
/// Charity share of a superblock's superblock-only allocation, in basis points.
pub const CHARITY_SHARE_BPS: u64 = 500;
pub const BPS_PRECISION: u64 = 10_000;

/// Hard-coded (height, block hash) pairs a syncing node refuses to reorg
/// past. Empty on this chain so far; populated as the network matures and
/// releases pin known-good history.
pub const CHECKPOINTS: &[(u64, [u8; 32])] = &[];
