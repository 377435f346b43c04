//! Policy knobs the payment shell reads, kept out of the flow engine's core
//! (`SPEC_FULL.md` §10.3; `spec.md` §9's open-question decisions).

/// Configuration for one `ripple_calculate` invocation. Reserve and fee
/// constants are read by both the shell and the engine's native steps;
/// `deposit_auth_wedge_exempt` is read only by the shell, never by
/// `flow::flow` itself — see `DESIGN.md`'s Open Question decision 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Base reserve every account root must maintain, in drops.
    pub reserve_base: i64,
    /// Additional reserve per owned ledger object, in drops.
    pub reserve_increment: i64,
    /// The reference transaction cost, in drops.
    pub base_fee_drops: i64,
    /// The identity transfer-rate value (no fee): `10^9`.
    pub transfer_rate_identity: u32,
    /// The parent ledger's close time (seconds since the Ripple epoch),
    /// against which an offer's `expiration` is checked (`spec.md` §4.3.3).
    pub close_time: u32,
    /// Whether the payment shell should apply the small-native-payment
    /// deposit-auth wedge-prevention exemption (`spec.md` §9): a payment
    /// below `reserve_base` is allowed to bypass deposit-auth when both the
    /// source and destination balances are themselves below the base
    /// reserve. The flow engine core never reads this; only
    /// `payment::ripple_calculate` consults it before invoking the driver.
    pub deposit_auth_wedge_exempt: bool,
}

impl EngineConfig {
    /// Values matching the production ledger's current defaults.
    pub fn mainnet_defaults() -> EngineConfig {
        EngineConfig {
            reserve_base: 10_000_000,
            reserve_increment: 2_000_000,
            base_fee_drops: 10,
            transfer_rate_identity: 1_000_000_000,
            close_time: 0,
            deposit_auth_wedge_exempt: true,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig::mainnet_defaults()
    }
}
