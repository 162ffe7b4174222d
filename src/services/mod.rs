pub mod credentials;
pub mod http;
pub mod request;
