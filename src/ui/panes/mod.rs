//! TUI pane rendering modules
//!
//! # Pane Modules
//!
//! - [`source`]: the program text, styled by token kind, with the current
//!   token and any syntax error highlighted
//! - [`trace`]: recorded parser events indented by rule depth
//! - [`tokens`]: the tokenizer's buffer with the current mark
//! - [`status`]: status bar with keybindings and replay state
//!
//! Each pane module exports a `render_*` function taking the frame, its
//! area, the data to draw, a focus flag and its scroll state.

pub mod source;
pub mod status;
pub mod tokens;
pub mod trace;

pub use source::{render_source_pane, SourceRenderData, SourceScrollState};
pub use status::{render_status_bar, ParseOutcome};
pub use tokens::render_tokens_pane;
pub use trace::render_trace_pane;
