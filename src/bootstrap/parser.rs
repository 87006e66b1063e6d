use crate::topology::{NULL_TARGET, PipelineDefinition, ServiceNode};
use indexmap::IndexMap;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use tracing::{debug, info};

/// Key prefix shared by every bootstrap attribute
pub const KEY_PREFIX: &str = "pipeline.configs";
pub const LISTEN_TOPICS_ATTR: &str = "kafka-listen-topics";
pub const PUBLISH_TOPICS_ATTR: &str = "kafka-publish-topics";
pub const FORWARD_TO_ATTR: &str = "grpc-forward-to";

static SERVICE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^pipeline\.configs\.([\w-]+)\.service\.([\w-]+)\.([\w-]+)$")
        .expect("service key pattern is valid")
});

pub struct BootstrapParser;

impl BootstrapParser {
    /// Build pipelines from flat `pipeline.configs.<pipeline>.service.<service>.<attr>` keys
    pub fn parse(properties: &IndexMap<String, String>) -> BTreeMap<String, PipelineDefinition> {
        let discovered = Self::discover(properties);

        let mut pipelines = BTreeMap::new();
        for (pipeline_name, services) in &discovered {
            debug!("Pipeline {} has services: {:?}", pipeline_name, services);
            let mut pipeline = PipelineDefinition::new(pipeline_name.clone());

            let nodes: Vec<ServiceNode> = services
                .iter()
                .map(|service_name| Self::build_service(properties, pipeline_name, service_name))
                .collect();
            for node in &nodes {
                pipeline.services.insert(node.name.clone(), node.clone());
            }
            // Second insert pass creates stubs for targets nobody declared
            for node in nodes {
                let created = pipeline.upsert_service(node);
                if !created.is_empty() {
                    debug!(
                        "Pipeline {} auto-created services: {:?}",
                        pipeline_name, created
                    );
                }
            }

            pipelines.insert(pipeline_name.clone(), pipeline);
        }

        info!("Loaded {} pipelines from bootstrap properties", pipelines.len());
        for (name, pipeline) in &pipelines {
            for (service_name, service) in &pipeline.services {
                debug!(
                    "Pipeline {}: service {}, listen: {:?}, publish: {:?}, forward: {:?}",
                    name,
                    service_name,
                    service.kafka_listen_topics,
                    service.kafka_publish_topics,
                    service.grpc_forward_to
                );
            }
        }
        pipelines
    }

    /// Collect every (pipeline, service) pair named by any attribute key
    fn discover(properties: &IndexMap<String, String>) -> BTreeMap<String, BTreeSet<String>> {
        let mut discovered: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for key in properties.keys() {
            match SERVICE_KEY.captures(key) {
                Some(caps) => {
                    discovered
                        .entry(caps[1].to_string())
                        .or_default()
                        .insert(caps[2].to_string());
                }
                None => debug!("Ignoring bootstrap key: {}", key),
            }
        }
        discovered
    }

    fn build_service(
        properties: &IndexMap<String, String>,
        pipeline: &str,
        service: &str,
    ) -> ServiceNode {
        let lookup = |attr| attribute(properties, pipeline, service, attr);

        ServiceNode {
            name: service.to_string(),
            kafka_listen_topics: lookup(LISTEN_TOPICS_ATTR).map(split_list),
            kafka_publish_topics: lookup(PUBLISH_TOPICS_ATTR).map(split_list),
            grpc_forward_to: lookup(FORWARD_TO_ATTR)
                .filter(|value| value.trim() != NULL_TARGET)
                .map(split_list),
        }
    }
}

fn attribute<'a>(
    properties: &'a IndexMap<String, String>,
    pipeline: &str,
    service: &str,
    attr: &str,
) -> Option<&'a str> {
    properties
        .get(&format!("{KEY_PREFIX}.{pipeline}.service.{service}.{attr}"))
        .map(String::as_str)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
