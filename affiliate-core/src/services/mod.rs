//! Repository-backed operations built on the pure calculations.

pub mod deal_closer;
pub mod lead_view;
pub mod lifecycle;
pub mod settings;

pub use deal_closer::{CloseError, CloseOutcome, ClosePlan, DealCloser, plan_close};
pub use lead_view::lead_view;
pub use lifecycle::{LifecycleError, approve_commission, mark_commission_paid, set_deal_status};
pub use settings::{SettingsError, SettingsResolver, validate_settings};
