//! These models represent the objects passed between the portal, the relay and the backend
//!
//! There are three related formats we need to interact with:
//! - chat messages, sent from the portal to the relay as conversation history
//! - the relay request body, forwarded to the backend in its abbreviated form
//! - stream events, framed as `data: <json>` lines on the way back
//!
//! We convert to and from these internal structs at the edges.
pub mod event;
pub mod message;
pub mod role;
