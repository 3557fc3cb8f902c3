//! PC-class peripheral drivers (spec.md §1: "a small fixed set of PC-class
//! peripherals").

pub mod keyboard;
pub mod pic;
pub mod pit;
pub mod ps2;
pub mod rtc;
pub mod screen;
pub mod serial;
