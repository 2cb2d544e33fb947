pub mod model;
pub mod service;
pub mod status;

pub use model::*;
pub use service::LoanService;
pub use status::{display_status, outstanding_balance, settles, DisplayStatus, LoanEvent, LoanStatus};
