//! External service clients for the Veristream pipeline.
//!
//! This crate provides:
//! - The encoder/streaming provider client
//! - Classification provider chains (authenticity + safety) with a
//!   deterministic mock fallback
//! - Push and mail dispatch

pub mod classify;
pub mod encoder;
pub mod error;
pub mod mailer;
pub mod mock;
pub mod push;

pub use classify::{
    AuthenticityChain, AuthenticityClassifier, ClassifyConfig, HttpClassifier, SafetyChain,
    SafetyClassifier,
};
pub use encoder::{
    EncoderAsset, EncoderAssetStatus, EncoderConfig, EncodingProvider, HttpEncodingProvider,
};
pub use error::{ProviderError, ProviderResult};
pub use mailer::{HttpMailer, Mailer, NoopMailer};
pub use mock::MockClassifier;
pub use push::{HttpPushProvider, PushProvider};
