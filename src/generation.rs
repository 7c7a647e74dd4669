pub mod client;
pub mod imagen;
pub mod openai;
pub mod provider;
