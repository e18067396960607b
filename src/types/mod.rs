//! Core value types shared by the client, the middlewares and the backends.

pub mod options;
pub mod response;

pub use options::*;
pub use response::*;
