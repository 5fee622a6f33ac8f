pub mod mail;

pub use mail::{SendMailRequest, SendMailResponse};
