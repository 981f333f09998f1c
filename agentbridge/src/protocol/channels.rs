//! Logical channel naming for pub/sub-style transports.
//!
//! Four logical channels carry the message kinds:
//! announcements → `capabilities`, commands → `commands`,
//! results/errors/session → `responses`, unsolicited events → `events`.
//! Names follow `{prefix}-{applicationId}-{environmentId}-{channel}`.

use serde::{Deserialize, Serialize};

use super::messages::MessageBody;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Capabilities,
    Commands,
    Responses,
    Events,
}

impl ChannelKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            ChannelKind::Capabilities => "capabilities",
            ChannelKind::Commands => "commands",
            ChannelKind::Responses => "responses",
            ChannelKind::Events => "events",
        }
    }
}

impl MessageBody {
    /// The logical channel this kind travels on.
    pub fn channel(&self) -> ChannelKind {
        match self {
            MessageBody::CapabilityRegister(_) | MessageBody::CapabilityUpdate(_) => {
                ChannelKind::Capabilities
            }
            MessageBody::CallFunction { .. }
            | MessageBody::UpdateComponent { .. }
            | MessageBody::CallComponentAction { .. }
            | MessageBody::QueryCapabilities { .. } => ChannelKind::Commands,
            MessageBody::FunctionResult(_)
            | MessageBody::ComponentUpdateResult(_)
            | MessageBody::ComponentActionResult(_)
            | MessageBody::CapabilitiesResult(_)
            | MessageBody::SessionConnect
            | MessageBody::SessionDisconnect { .. }
            | MessageBody::SessionHeartbeat
            | MessageBody::Error { .. } => ChannelKind::Responses,
            MessageBody::Event { .. } => ChannelKind::Events,
        }
    }
}

/// The four concrete channel names for one application/environment pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSet {
    prefix: String,
    application_id: String,
    environment_id: String,
}

impl ChannelSet {
    pub fn new(
        prefix: impl Into<String>,
        application_id: impl Into<String>,
        environment_id: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            application_id: application_id.into(),
            environment_id: environment_id.into(),
        }
    }

    pub fn name(&self, kind: ChannelKind) -> String {
        format!(
            "{}-{}-{}-{}",
            self.prefix,
            self.application_id,
            self.environment_id,
            kind.suffix()
        )
    }

    /// The channel a given message is published on.
    pub fn name_for(&self, body: &MessageBody) -> String {
        self.name(body.channel())
    }

    pub fn all(&self) -> Vec<String> {
        [
            ChannelKind::Capabilities,
            ChannelKind::Commands,
            ChannelKind::Responses,
            ChannelKind::Events,
        ]
        .into_iter()
        .map(|kind| self.name(kind))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn names_follow_the_four_part_convention() {
        let channels = ChannelSet::new("bridge", "shop", "prod");
        assert_eq!(channels.name(ChannelKind::Commands), "bridge-shop-prod-commands");
        assert_eq!(
            channels.all(),
            vec![
                "bridge-shop-prod-capabilities",
                "bridge-shop-prod-commands",
                "bridge-shop-prod-responses",
                "bridge-shop-prod-events",
            ]
        );
    }

    #[test]
    fn every_kind_routes_to_its_channel() {
        assert_eq!(
            MessageBody::CapabilityUpdate(Default::default()).channel(),
            ChannelKind::Capabilities
        );
        assert_eq!(
            MessageBody::CallFunction {
                name: "f".into(),
                parameters: json!({}),
            }
            .channel(),
            ChannelKind::Commands
        );
        assert_eq!(MessageBody::SessionHeartbeat.channel(), ChannelKind::Responses);
        assert_eq!(
            MessageBody::Event {
                name: "e".into(),
                data: json!(null),
            }
            .channel(),
            ChannelKind::Events
        );
    }
}
