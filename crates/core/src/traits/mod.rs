//! Collaborator traits for the coaching core
//!
//! The core never talks to a model or a database directly; it goes
//! through these traits so backends can be swapped and mocked.
//!
//! ```text
//! Inference:
//!   - RemoteInference: role-tagged messages → completion (cloud path, insight extraction)
//!   - LocalInference:  prompt + generation params → text (on-device path)
//!
//! Persistence:
//!   - KeyValueStore: get/set/delete/list of JSON blobs
//! ```

mod inference;
mod store;

pub use inference::{
    ChatMessage, ChatRole, ComputeDevice, GenerationParams, LocalInference, RemoteInference,
};
pub use store::KeyValueStore;
