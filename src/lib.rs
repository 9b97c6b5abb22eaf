// perps-margin: margin engine for an AMM-backed perpetual futures pair.
// one base token as collateral, positions sized in virtual quote, funding via a
// cumulative premium fraction. deterministic: the clock and prices come from the caller.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: AccountId, Side, QuoteSize, Price, Timestamp
//   3.x  margin.rs: position valuation, health snapshot, withdrawable
//   4.x  position.rs: position struct, increase/reduce/flip netting
//   5.x  funding.rs: cumulative premium fraction, boost, per-trader fee
//   6.x  liquidation.rs: liquidation check, bonus split, insurance fund
//   7.x  config.rs: risk params, engine knobs, env presets, toml loading
//   8.x  engine/: margin engine: deposits, positions, funding, liquidations
//   9.0  amm.rs: virtual AMM trait + fixed-price mock
//   9.1  oracle.rs: index price + premium fraction (mocked)
//   9.2  custody.rs: wallet <-> custody token flows (mocked)
//   11.x events.rs: state transition events for audit
//   12.x router.rs: deadlines, slippage bounds, wallet-funded opens
//   13.x keeper.rs: signed limit orders executed by keepers

// core ledger modules
pub mod engine;
pub mod events;
pub mod funding;
pub mod liquidation;
pub mod margin;
pub mod position;
pub mod types;

// integration modules
pub mod amm;
pub mod config;
pub mod custody;
pub mod keeper;
pub mod oracle;
pub mod router;

// re exports for convenience
pub use engine::*;
pub use events::*;
pub use funding::*;
pub use liquidation::*;
pub use margin::*;
pub use position::*;
pub use types::*;
pub use amm::{Amm, AmmError, MockAmm, Reserves, SwapDirection};
pub use config::{ConfigError, Environment, MarginSettings, RiskConfig, RouterRegistry, CONFIG_ENV_VAR};
pub use custody::{CollateralVault, CustodyError, TransferKind, TransferRecord};
pub use keeper::{CloseOrder, KeeperError, OpenOrder, OrderBook, Signed};
pub use oracle::{MockPriceOracle, OracleError, PriceOracle};
pub use router::{Router, RouterCloseResult, RouterError};
