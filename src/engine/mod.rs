// 8.0: margin engine. position ledger, funding accrual, health views, liquidations.
// every mutating call is checkpointed and settles funding before it touches a position.
// deterministic: the clock is set by the caller, collaborators are traits.

mod config;
mod core;
mod positions;
mod pricing;
mod funding;
mod liquidations;
mod results;

pub use config::EngineConfig;
pub use core::Margin;
pub use results::{CloseResult, CpfUpdate, LiquidationResult, MarginError, OpenResult};
