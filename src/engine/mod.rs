//! Pure computation engine(s): adaptive range fetching and PnL windowing.

pub mod pnl_window;
pub mod position;
pub mod ranged_fetcher;

pub use pnl_window::{pnl_by_window, window_pnl, HoldingWindow, Leg, PnlResult};
pub use position::{Position, PositionSummary};
pub use ranged_fetcher::{FailureAction, FetchConfig, FetchCursor, FetchError, RangedFetcher};
