//! Data model shared by the hydra client crates.
//!
//! Everything that crosses the boundary between the caller, the coordinator and the
//! control plane lives here:
//! - [`JobSpec`] and its builder (the only way to obtain a validated spec);
//! - [`JobAttempt`] and [`AttemptState`] describing one execution try;
//! - [`JobOutcome`] and [`JobFailure`] describing the terminal result;
//! - the [`PayloadCodec`] seam used to encode function arguments and results.

mod error;
pub use error::{CodecError, SpecError};

mod domain;
pub use domain::*;

mod spec;
pub use spec::*;

mod codec;
pub use codec::{JsonCodec, PayloadCodec, decode_as, encode_as};
