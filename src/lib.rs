//! Pronunciation practice engine.
//!
//! * [`diagnosis`]: IPA tokenizing, phoneme alignment and error diagnosis.
//! * [`progression`]: the calibration / practice state machine.
//! * [`coach`]: action decisions, word selection and the service facade.
//! * [`gateway`]: the external recognition / generation service.
//! * [`store`]: versioned learner progress persistence.
//! * [`config`]: `settings.toml` and platform paths.

pub mod coach;
pub mod config;
pub mod diagnosis;
pub mod error;
pub mod gateway;
pub mod progression;
pub mod store;

pub use error::CoachError;
