pub mod media;
pub mod request;
pub mod settings;
