use serde::{Deserialize, Serialize};

/**
    Messages as the hooking agent sends them:

    ```text
    {"type":"send","payload":{"type":"challenge","challenge":[..],"service_certificate":[..]|null}}
    {"type":"send","payload":{"type":"license","license":[..]}}
    {"type":"error","description":"..","stack":".."}
    ```

    Byte sequences are JSON arrays of unsigned bytes.
*/
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum AgentMessage {
    Send {
        payload: Payload,
    },
    Error {
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        stack: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Payload {
    Challenge {
        #[serde(default)]
        challenge: Option<Vec<u8>>,
        #[serde(default)]
        service_certificate: Option<Vec<u8>>,
    },
    License {
        #[serde(default)]
        license: Option<Vec<u8>>,
    },
    #[serde(other)]
    Unknown,
}

/**
    An event the engine reacts to.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// The application produced a license challenge and is waiting for a reply.
    Challenge {
        challenge: Vec<u8>,
        service_certificate: Option<Vec<u8>>,
    },
    /// The application received a license response.
    License { license: Vec<u8> },
    /// The agent reported a script error.
    Error { description: String },
}

impl BridgeEvent {
    /**
        Decode one agent message. Well-formed messages of a type the engine
        does not handle yield `Ok(None)`.
    */
    pub fn parse(line: &str) -> Result<Option<Self>, serde_json::Error> {
        let event = match serde_json::from_str::<AgentMessage>(line)? {
            AgentMessage::Send {
                payload:
                    Payload::Challenge {
                        challenge,
                        service_certificate,
                    },
            } => Some(Self::Challenge {
                challenge: challenge.unwrap_or_default(),
                service_certificate,
            }),
            AgentMessage::Send {
                payload: Payload::License { license },
            } => Some(Self::License {
                license: license.unwrap_or_default(),
            }),
            AgentMessage::Error { description, stack } => Some(Self::Error {
                description: stack
                    .or(description)
                    .unwrap_or_else(|| "agent reported an error without details".into()),
            }),
            AgentMessage::Send {
                payload: Payload::Unknown,
            }
            | AgentMessage::Unknown => None,
        };
        Ok(event)
    }
}

/**
    A reply to the agent. A response without `newChallenge` lets the
    application send its original challenge.
*/
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BridgeReply {
    Response {
        #[serde(rename = "newChallenge", skip_serializing_if = "Option::is_none")]
        new_challenge: Option<Vec<u8>>,
    },
}

impl BridgeReply {
    pub fn replace(new_challenge: Vec<u8>) -> Self {
        Self::Response {
            new_challenge: Some(new_challenge),
        }
    }

    pub fn keep_original() -> Self {
        Self::Response {
            new_challenge: None,
        }
    }

    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_with_certificate() {
        let line = r#"{"type":"send","payload":{"type":"challenge","challenge":[8,1,18,255],"service_certificate":[1,2]}}"#;
        assert_eq!(
            BridgeEvent::parse(line).unwrap(),
            Some(BridgeEvent::Challenge {
                challenge: vec![8, 1, 18, 255],
                service_certificate: Some(vec![1, 2]),
            })
        );
    }

    #[test]
    fn challenge_without_certificate() {
        for line in [
            r#"{"type":"send","payload":{"type":"challenge","challenge":[1],"service_certificate":null}}"#,
            r#"{"type":"send","payload":{"type":"challenge","challenge":[1]}}"#,
        ] {
            assert_eq!(
                BridgeEvent::parse(line).unwrap(),
                Some(BridgeEvent::Challenge {
                    challenge: vec![1],
                    service_certificate: None,
                })
            );
        }
    }

    #[test]
    fn license() {
        let line = r#"{"type":"send","payload":{"type":"license","license":[2,3]}}"#;
        assert_eq!(
            BridgeEvent::parse(line).unwrap(),
            Some(BridgeEvent::License {
                license: vec![2, 3]
            })
        );
    }

    #[test]
    fn error_prefers_stack() {
        let line = r#"{"type":"error","description":"ReferenceError","stack":"at hook.js:1","fileName":"hook.js","lineNumber":1}"#;
        assert_eq!(
            BridgeEvent::parse(line).unwrap(),
            Some(BridgeEvent::Error {
                description: "at hook.js:1".into()
            })
        );

        let line = r#"{"type":"error","description":"ReferenceError"}"#;
        assert_eq!(
            BridgeEvent::parse(line).unwrap(),
            Some(BridgeEvent::Error {
                description: "ReferenceError".into()
            })
        );
    }

    #[test]
    fn unknown_types_are_ignored() {
        assert_eq!(BridgeEvent::parse(r#"{"type":"log","level":"info"}"#).unwrap(), None);
        assert_eq!(
            BridgeEvent::parse(r#"{"type":"send","payload":{"type":"provision"}}"#).unwrap(),
            None
        );
    }

    #[test]
    fn malformed_lines_fail() {
        assert!(BridgeEvent::parse("not json").is_err());
        assert!(BridgeEvent::parse(r#"{"type":"send"}"#).is_err());
        assert!(BridgeEvent::parse(r#"{"type":"send","payload":{"type":"license","license":[256]}}"#).is_err());
    }

    #[test]
    fn reply_serialization() {
        assert_eq!(
            BridgeReply::replace(vec![1, 2, 3]).to_line().unwrap(),
            r#"{"type":"response","newChallenge":[1,2,3]}"#
        );
        assert_eq!(
            BridgeReply::keep_original().to_line().unwrap(),
            r#"{"type":"response"}"#
        );
    }
}
