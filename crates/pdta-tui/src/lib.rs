//! pdta-tui: terminal UI components for the PDTA assistant
//!
//! Chat widgets built on ratatui and crossterm. The crate is pure view
//! code: it renders message lists and input state, and translates key
//! events into actions. It never touches the conversation transcript.

pub mod input;
pub mod theme;
pub mod widgets;

pub use input::{Action, event_to_action, key_to_action};
pub use theme::Theme;
pub use widgets::{ChatMessage, DisplayRole, InputBox, MessageList, Spinner};
