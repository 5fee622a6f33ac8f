use serde::{Deserialize, Serialize};

use crate::mail::MessageFields;

/// Body of `POST /api/v1/mail`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMailRequest {
    #[serde(flatten)]
    pub fields: MessageFields,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SendMailResponse {
    pub sent: bool,
    pub recipients: usize,
    pub suppressed: bool,
}
