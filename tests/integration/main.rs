//! End-to-end decision cycles through the public API.

mod stubs;
mod benchmark;
mod live;
