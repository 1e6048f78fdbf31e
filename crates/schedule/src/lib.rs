//! Scheduled announcements - calendar-triggered outbound messages
//!
//! This crate owns the recurring "post your updates" announcement:
//! - **Spec** (`spec`) - Calendar trigger (weekdays + time-of-day + timezone)
//!   with virtual-clock-friendly next-occurrence evaluation
//! - **Announcer** (`announcer`) - Background task that fires one outbound
//!   message per matching calendar instant
//!
//! The announcer shares the outbound `ChatClient` handle with the event
//! handlers but is otherwise independent of inbound traffic: a failed send
//! never cancels future firings.

pub mod announcer;
pub mod spec;

pub use announcer::{Announcer, AnnouncerHandle, REGULAR_UPDATE_TEXT};
pub use spec::{ScheduleError, ScheduleSpec};
