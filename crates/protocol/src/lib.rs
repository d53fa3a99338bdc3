//! Wire protocol types for the presign → PUT → finalize file transfer API.
//!
//! Everything in here is plain data: request/response bodies, endpoint
//! paths and header names shared by the client crates.

pub mod constants;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use messages::{
    ApiMessage, FinalizeResponse, PresignRequest, PresignResponse, ProfileFinalizeRequest,
    ProfileImageResponse,
};
pub use types::{Credentials, FileRecord};
