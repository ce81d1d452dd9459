//! JSON messages exchanged between the two peers through the relay

use serde::{Deserialize, Serialize};

use super::state::NegotiationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn new(kind: SdpType, sdp: impl Into<String>) -> Self {
        Self {
            kind,
            sdp: sdp.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
        }
    }
}

/// `{"sdp": {...}}` or `{"candidate": {...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerSignal {
    Sdp(SessionDescription),
    Candidate(IceCandidate),
}

impl PeerSignal {
    pub fn encode(&self) -> Result<String, NegotiationError> {
        serde_json::to_string(self).map_err(|e| NegotiationError::Encode(e.to_string()))
    }

    pub fn decode(text: &str) -> Result<Self, NegotiationError> {
        serde_json::from_str(text).map_err(|e| NegotiationError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_offer() {
        let signal = PeerSignal::Sdp(SessionDescription::new(SdpType::Offer, "v=0"));
        assert_eq!(
            signal.encode().unwrap(),
            r#"{"sdp":{"type":"offer","sdp":"v=0"}}"#
        );
    }

    #[test]
    fn parse_answer() {
        let json = r#"{"sdp": {"type": "answer", "sdp": "v=0\r\no=- 1 2 IN IP4 0.0.0.0"}}"#;
        let signal = PeerSignal::decode(json).unwrap();
        match signal {
            PeerSignal::Sdp(description) => {
                assert_eq!(description.kind, SdpType::Answer);
                assert!(description.sdp.starts_with("v=0"));
            }
            other => panic!("expected a description, got {:?}", other),
        }
    }

    #[test]
    fn parse_browser_candidate() {
        let json = r#"{"candidate": {"candidate": "candidate:1 1 udp 2122260223 192.168.1.2 54321 typ host", "sdpMid": "0", "sdpMLineIndex": 0, "usernameFragment": "abcd"}}"#;
        let signal = PeerSignal::decode(json).unwrap();
        match signal {
            PeerSignal::Candidate(candidate) => {
                assert!(candidate.candidate.ends_with("typ host"));
                assert_eq!(candidate.sdp_mid.as_deref(), Some("0"));
                assert_eq!(candidate.sdp_m_line_index, Some(0));
            }
            other => panic!("expected a candidate, got {:?}", other),
        }
    }

    #[test]
    fn candidate_without_optional_fields() {
        let json = r#"{"candidate":{"candidate":"c1"}}"#;
        assert_eq!(
            PeerSignal::decode(json).unwrap(),
            PeerSignal::Candidate(IceCandidate::new("c1"))
        );
        assert_eq!(
            PeerSignal::Candidate(IceCandidate::new("c1")).encode().unwrap(),
            json
        );
    }

    #[test]
    fn malformed_messages_are_rejected() {
        for text in ["", "hello", r#"{"sdp":{"type":"bogus","sdp":""}}"#, r#"{"other":1}"#] {
            assert!(matches!(
                PeerSignal::decode(text),
                Err(NegotiationError::Malformed(_))
            ));
        }
    }
}
