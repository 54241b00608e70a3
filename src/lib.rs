//! Voxnote - voice annotation pipeline
//!
//! This crate records audio from the microphone into a session-scoped
//! buffer and recognizes it to text through a pluggable set of speech
//! recognition providers (Google Cloud Speech, Yandex SpeechKit, local
//! whisper.cpp).
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Core value objects, entities, and errors (audio buffer,
//!   annotation lifecycle, settings)
//! - **Application**: Use cases and port interfaces (capture session,
//!   recognition task, annotation state machine)
//! - **Infrastructure**: Adapter implementations (cpal, cloud providers,
//!   whisper.cpp, settings file)
//! - **CLI**: Command-line shell consuming the pipeline's event surface

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
