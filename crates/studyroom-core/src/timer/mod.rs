mod controller;
mod driver;
mod engine;
mod session;

pub use controller::{FocusController, FocusSettings};
pub use driver::{DriverHandle, FocusDriver};
pub use engine::{FocusTimer, PulseTicket};
pub use session::{
    local_session_id, progress_pct, FocusSession, FocusSnapshot, FocusState, FocusTask,
    LOCAL_SESSION_PREFIX,
};
