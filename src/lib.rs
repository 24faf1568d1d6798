//! Chat Demo Engine — scripted playback of business chat conversations.
//!
//! Turns declarative scenario definitions (messages, typing pauses and
//! interactive forms) into a timed action sequence, and plays it back on a
//! virtual clock with pause, resume, speed control, looping and live form
//! input. Rendering is left to the host; the engine only exposes state.

pub mod builtin;
pub mod core;
pub mod schema;
