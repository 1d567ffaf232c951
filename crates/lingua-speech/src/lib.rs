//! External collaborators for the lingua platform.
//!
//! Everything the conversation pipeline talks to outside its own database
//! lives here behind async traits: audio object storage, speech-to-text,
//! reply generation, speech synthesis, and pronunciation scoring. The HTTP
//! implementations speak the wire formats of the deployed services; tests
//! and the server's integration suite substitute scripted implementations.

mod error;
mod object_store;
mod reply;
mod scorer;
mod stt;
mod traits;
mod tts;

pub use error::SpeechError;
pub use object_store::{FsObjectStore, SIGNED_URL_DEFAULT_TTL};
pub use reply::HttpReplyGenerator;
pub use scorer::HttpPronunciationScorer;
pub use stt::HttpSpeechToText;
pub use traits::{Audience, ObjectStore, PronunciationScorer, ReplyGenerator, SpeechSynthesizer, SpeechToText};
pub use tts::HttpSpeechSynthesizer;
