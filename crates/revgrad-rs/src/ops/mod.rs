//! Operation nodes implementing the forward/backward contract.
//!
//! Each node keeps references to its input and output tensors, delegates
//! the numeric work to the backend kernels, and routes every allocation
//! through an [`AllocScope`](crate::graph::AllocScope) so only the values
//! written to a map survive the call.

pub mod subtract;

pub use subtract::Subtract;
