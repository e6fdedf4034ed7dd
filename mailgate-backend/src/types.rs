//! Request and response envelopes, one pair per endpoint.
//!
//! Responses are deserialized strictly: an unexpected field means the
//! backend and the gateway disagree about the contract, which should surface
//! as an error instead of being silently dropped.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use mailgate_common::model::{Mail, MailMessage};

#[derive(Debug, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub mail_versions: &'a HashMap<u64, i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct InboundRequest<'a> {
    pub mail_message: &'a MailMessage,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct MailResponse {
    pub success: bool,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub found: bool,
    #[serde(default)]
    pub mail: Option<Mail>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RefreshResponse {
    pub success: bool,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub mails: Vec<Mail>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct StatusResponse {
    pub success: bool,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct OutboundResponse {
    pub success: bool,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub mail_messages: Vec<MailMessage>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn refresh_request_carries_the_version_map() {
        let versions = HashMap::from([(3_u64, 7_i64)]);
        let json = serde_json::to_string(&RefreshRequest {
            mail_versions: &versions,
        })
        .unwrap();

        assert_eq!(json, r#"{"mail_versions":{"3":7}}"#);
    }

    #[test]
    fn mail_response_distinguishes_found_from_missing() {
        let found: MailResponse = serde_json::from_str(
            r#"{"success":true,"found":true,"mail":{"id":1,"host":"example.com","relay":true}}"#,
        )
        .unwrap();
        assert!(found.success);
        assert!(found.found);
        assert_eq!(found.mail.unwrap().host, "example.com");

        let missing: MailResponse = serde_json::from_str(r#"{"success":true,"found":false}"#).unwrap();
        assert!(missing.success);
        assert!(!missing.found);
        assert!(missing.mail.is_none());
    }

    #[test]
    fn unexpected_response_fields_are_rejected() {
        let result: Result<StatusResponse, _> =
            serde_json::from_str(r#"{"success":true,"surprise":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn outbound_response_defaults_to_an_empty_queue() {
        let response: OutboundResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(response.mail_messages.is_empty());
    }
}
