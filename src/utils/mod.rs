pub mod clock;
pub mod retry;

pub use clock::{Clock, FixedClock, SystemClock};
pub use retry::{retry_on_transient, IsTransient, RetryConfig, RetryResult};
