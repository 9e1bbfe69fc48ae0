//! Evidence verification for adjudication replies.
//!
//! Adjudication returns the quotes it relied on. A quote is only kept as
//! evidence when it can be found in the passages that were actually shown;
//! anything else is dropped and counted.

mod validator;

pub use validator::{QuoteCheck, QuoteRejection, QuoteVerifier};
