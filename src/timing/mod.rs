mod clock;
mod scheduler;
mod ticker;
mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use scheduler::{CancelToken, EventScheduler, PendingTrigger, ScheduledHandle, schedule_score};
pub use ticker::Ticker;
pub use transport::{PumpOutcome, Transport, TransportState};
