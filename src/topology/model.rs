use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder value that is never materialized as a topic or forward target
pub const NULL_TARGET: &str = "null";

/// A named service within a pipeline
///
/// The three lists are `None` when the attribute was never set. `Some(vec![])`
/// is kept distinct so stored values round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceNode {
    /// Unique within the owning pipeline
    pub name: String,
    /// Topics this service subscribes to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kafka_listen_topics: Option<Vec<String>>,
    /// Topics this service publishes to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kafka_publish_topics: Option<Vec<String>>,
    /// Services in the same pipeline this service calls directly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grpc_forward_to: Option<Vec<String>>,
}

impl ServiceNode {
    /// Create a service with no topics and no forwards
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kafka_listen_topics: None,
            kafka_publish_topics: None,
            grpc_forward_to: None,
        }
    }

    pub fn with_listen_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kafka_listen_topics = Some(topics.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_publish_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kafka_publish_topics = Some(topics.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_forward_to<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grpc_forward_to = Some(targets.into_iter().map(Into::into).collect());
        self
    }

    /// Listen topics, skipping `"null"` placeholders
    pub fn listen_topics(&self) -> impl Iterator<Item = &str> {
        materialized(&self.kafka_listen_topics)
    }

    /// Publish topics, skipping `"null"` placeholders
    pub fn publish_topics(&self) -> impl Iterator<Item = &str> {
        materialized(&self.kafka_publish_topics)
    }

    /// Forward targets, skipping `"null"` placeholders
    pub fn forward_targets(&self) -> impl Iterator<Item = &str> {
        materialized(&self.grpc_forward_to)
    }

    /// True when the node has no topics and no forwards
    pub fn is_stub(&self) -> bool {
        self.listen_topics().next().is_none()
            && self.publish_topics().next().is_none()
            && self.forward_targets().next().is_none()
    }
}

fn materialized(list: &Option<Vec<String>>) -> impl Iterator<Item = &str> {
    list.iter()
        .flatten()
        .map(String::as_str)
        .filter(|item| *item != NULL_TARGET)
}

/// A named pipeline and its services, keyed by service name
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    #[serde(rename = "service", default)]
    pub services: BTreeMap<String, ServiceNode>,
}

impl PipelineDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            services: BTreeMap::new(),
        }
    }

    pub fn contains_service(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub fn service(&self, name: &str) -> Option<&ServiceNode> {
        self.services.get(name)
    }

    /// Insert `node`, creating stubs for forward targets that are not yet present.
    ///
    /// Returns the names of the stubs that were created.
    pub fn upsert_service(&mut self, node: ServiceNode) -> Vec<String> {
        let mut created = Vec::new();
        for target in node.forward_targets() {
            if target == node.name || self.services.contains_key(target) {
                continue;
            }
            self.services.insert(target.to_string(), ServiceNode::new(target));
            created.push(target.to_string());
        }
        self.services.insert(node.name.clone(), node);
        created
    }

    /// Re-key services by their own names and fill in missing forward targets.
    ///
    /// Values decoded from the store may break both rules.
    pub fn normalized(self) -> Self {
        let mut pipeline = PipelineDefinition::new(self.name);
        let nodes: Vec<ServiceNode> = self
            .services
            .into_iter()
            .map(|(key, mut node)| {
                if node.name.is_empty() {
                    node.name = key;
                }
                node
            })
            .collect();
        for node in &nodes {
            pipeline.services.insert(node.name.clone(), node.clone());
        }
        for node in nodes {
            pipeline.upsert_service(node);
        }
        pipeline
    }
}

/// Inbound attributes of a single service, as accepted by the mutation accessor
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDefinition {
    pub name: String,
    #[serde(default)]
    pub kafka_listen_topics: Option<Vec<String>>,
    #[serde(default)]
    pub kafka_publish_topics: Option<Vec<String>>,
    #[serde(default)]
    pub grpc_forward_to: Option<Vec<String>>,
}

impl From<ServiceDefinition> for ServiceNode {
    fn from(dto: ServiceDefinition) -> Self {
        Self {
            name: dto.name,
            kafka_listen_topics: dto.kafka_listen_topics,
            kafka_publish_topics: dto.kafka_publish_topics,
            grpc_forward_to: dto.grpc_forward_to,
        }
    }
}
