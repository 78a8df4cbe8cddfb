//! Ports: the seams where the scheduler talks to its environment.

pub mod clock;
pub mod observer;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::observer::TaskObserver;
