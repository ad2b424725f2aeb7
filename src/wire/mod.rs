//! Wire encoding of frames and properties.
//!
//! [`frames`] splits a received datagram into borrowed [`Frame`] views without
//! copying; [`ConfigFrame`] is the owned form used for queries and writes, and
//! [`Property`] is the tagged union of the property payloads it may carry.
//!
//! ```rust
//! use xipp_trial::wire::{ConfigFrame, frames};
//! use xipp_trial::types::ConfigTarget;
//!
//! let query = ConfigFrame::query(ConfigTarget::new(255, 0, 0));
//! let datagram = query.encode()?;
//! for frame in frames(&datagram) {
//!     let frame = frame?;
//!     assert!(frame.is_config());
//!     assert_eq!(frame.to_config()?.target.processor, 255);
//! }
//! # Ok::<(), xipp_trial::XippError>(())
//! ```

pub(crate) mod bytes;
mod frame;
mod property;

pub use frame::{
    ConfigFrame, DataFrame, Frame, FrameIter, MAX_PAYLOAD_BYTES, encode_frame, frames,
};
pub use property::Property;
