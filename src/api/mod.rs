//! Edge of the remote FinQuiz API.
//!
//! Everything above this module sees either decoded payloads or a normalized
//! [`ApiError`]; raw transport failures never leak past it.

mod error;
#[cfg(test)]
pub(crate) mod fake;
mod mutations;
mod transport;

pub use error::ApiError;
pub use mutations::{Mutation, MutationOutcome, Settled, UpdateStrategy};
pub use transport::{
    ApiRequest, ApiResponse, HttpMethod, HttpTransport, ResponseMeta, Transport, TransportError,
};
