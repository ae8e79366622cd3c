//! Terminal front-end for interactive chat sessions.
//!
//! [`repl`] owns stdin handling and incremental printing, while
//! [`crate::core`] owns the transcript and stream coordination.

pub mod repl;
