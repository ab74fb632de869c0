//! Exercise coaching engine: pose landmarks in, instructions and scores out.
//!
//! A [`Session`] runs one exercise described by a [`Profile`]. Feed it
//! [`PoseFrame`]s in timestamp order; each call returns what to tell the user
//! and, on the frame that completes the exercise, the final [`ScoreResult`].

pub mod conditions;
pub mod config;
pub mod error;
pub mod geometry;
pub mod input;
pub mod motion;
pub mod phase;
pub mod pose;
pub mod scale;
pub mod scoring;
pub mod session;
pub mod stability;

pub use config::{Profile, ProfileStore};
pub use error::{Error, Result};
pub use input::FrameReader;
pub use pose::{BodyPart, Landmark, PoseFrame, PoseSample};
pub use scoring::ScoreResult;
pub use session::{FrameOutcome, Session};
