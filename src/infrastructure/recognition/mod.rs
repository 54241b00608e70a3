//! Recognition provider adapters

mod factory;
mod google;
mod whisper;
mod yandex;

pub use factory::ProviderFactory;
pub use google::GoogleRecognizer;
pub use whisper::WhisperRecognizer;
pub use yandex::YandexRecognizer;
