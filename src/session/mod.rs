//! Persona-scoped conversation threads.
//!
//! A [`Session`] is one ordered conversation with a single persona. Sessions
//! are plain data owned by a [`Controller`](crate::controller::Controller);
//! they carry no locking of their own.
//!
//! # Example
//!
//! ```rust
//! use career_mentor::persona::Persona;
//! use career_mentor::session::{ChatMessage, MessageRole, Session};
//!
//! let mut session = Session::new(Persona::JobAdvisor);
//! let index = session.add_message(ChatMessage::user("What do data analysts earn?"));
//! assert_eq!(index, 1);
//!
//! // greeting + user message
//! assert_eq!(session.message_count(), 2);
//! assert_eq!(session.messages()[1].role, MessageRole::User);
//! ```

mod message;
mod thread;

pub use message::{ChatMessage, MessageRole};
pub use thread::Session;
