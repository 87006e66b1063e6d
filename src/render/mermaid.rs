//! Mermaid flowchart export.
//!
//! Services are visited in name order and each list in its stored order, so the
//! same pipeline always renders to the same text. Node ids are the category
//! prefix plus the name with every non-alphanumeric character replaced by `_`;
//! two different names mapping to one id is reported instead of merged.

use crate::error::{RenderError, RenderResult};
use crate::topology::PipelineDefinition;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    Topic,
    Service,
}

impl NodeCategory {
    pub fn class_name(self) -> &'static str {
        match self {
            NodeCategory::Topic => "topic",
            NodeCategory::Service => "service",
        }
    }

    fn class_def(self) -> &'static str {
        match self {
            NodeCategory::Topic => "fill:#fff4dd,stroke:#d4a017,color:#333",
            NodeCategory::Service => "fill:#dde9ff,stroke:#3d6bb3,color:#333",
        }
    }

    fn declare(self, id: &str, label: &str) -> String {
        match self {
            NodeCategory::Topic => format!("{id}([\"{label}\"])"),
            NodeCategory::Service => format!("{id}[\"{label}\"]"),
        }
    }
}

/// Diagram id of `name` within `category`
pub fn node_id(category: NodeCategory, name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}_{}", category.class_name(), safe)
}

fn escape_label(name: &str) -> String {
    name.replace('"', "#quot;")
}

#[derive(Default)]
struct Diagram {
    body: String,
    owners: HashMap<String, String>,
    topics: Vec<String>,
    services: Vec<String>,
    edges: HashSet<(String, String)>,
}

impl Diagram {
    /// Id of the node, declaring it on first reference
    fn node(&mut self, category: NodeCategory, name: &str) -> RenderResult<String> {
        let id = node_id(category, name);
        if let Some(owner) = self.owners.get(&id) {
            if owner != name {
                return Err(RenderError::IdentifierCollision {
                    id,
                    first: owner.clone(),
                    second: name.to_string(),
                });
            }
            return Ok(id);
        }

        let _ = writeln!(self.body, "    {}", category.declare(&id, &escape_label(name)));
        self.owners.insert(id.clone(), name.to_string());
        match category {
            NodeCategory::Topic => self.topics.push(id.clone()),
            NodeCategory::Service => self.services.push(id.clone()),
        }
        Ok(id)
    }

    fn edge(&mut self, from: &str, arrow: &str, to: &str) {
        if self.edges.insert((from.to_string(), to.to_string())) {
            let _ = writeln!(self.body, "    {from} {arrow} {to}");
        }
    }

    fn finish(self) -> String {
        let mut out = String::from("graph LR\n");
        out.push_str(&self.body);
        for (category, ids) in [
            (NodeCategory::Topic, &self.topics),
            (NodeCategory::Service, &self.services),
        ] {
            if ids.is_empty() {
                continue;
            }
            let _ = writeln!(
                out,
                "    classDef {} {}",
                category.class_name(),
                category.class_def()
            );
            let _ = writeln!(out, "    class {} {}", ids.join(","), category.class_name());
        }
        out
    }
}

/// Render one pipeline as a Mermaid `graph LR` flowchart
pub fn pipeline_to_mermaid(pipeline: &PipelineDefinition) -> RenderResult<String> {
    let mut diagram = Diagram::default();

    for (name, service) in &pipeline.services {
        let service_id = diagram.node(NodeCategory::Service, name)?;

        for topic in service.listen_topics() {
            let topic_id = diagram.node(NodeCategory::Topic, topic)?;
            diagram.edge(&topic_id, "-->", &service_id);
        }
        for topic in service.publish_topics() {
            let topic_id = diagram.node(NodeCategory::Topic, topic)?;
            diagram.edge(&service_id, "-->", &topic_id);
        }
        for target in service.forward_targets() {
            let target_id = diagram.node(NodeCategory::Service, target)?;
            diagram.edge(&service_id, "-.->", &target_id);
        }
    }

    Ok(diagram.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::ServiceNode;

    #[test]
    fn test_node_id_sanitizes() {
        assert_eq!(node_id(NodeCategory::Topic, "orders.v1-raw"), "topic_orders_v1_raw");
        assert_eq!(node_id(NodeCategory::Service, "svc"), "service_svc");
    }

    #[test]
    fn test_topic_and_service_with_same_name_do_not_collide() {
        let mut pipeline = PipelineDefinition::new("p");
        pipeline.upsert_service(ServiceNode::new("orders").with_listen_topics(["orders"]));
        let out = pipeline_to_mermaid(&pipeline).unwrap();
        assert!(out.contains("    topic_orders --> service_orders\n"));
    }

    #[test]
    fn test_duplicate_edges_emitted_once() {
        let mut pipeline = PipelineDefinition::new("p");
        pipeline.upsert_service(ServiceNode::new("a").with_publish_topics(["t", "t"]));
        let out = pipeline_to_mermaid(&pipeline).unwrap();
        assert_eq!(out.matches("service_a --> topic_t").count(), 1);
    }

    #[test]
    fn test_labels_are_escaped() {
        let mut pipeline = PipelineDefinition::new("p");
        pipeline.upsert_service(ServiceNode::new("say\"hi"));
        let out = pipeline_to_mermaid(&pipeline).unwrap();
        assert!(out.contains("service_say_hi[\"say#quot;hi\"]"));
    }

    #[test]
    fn test_empty_pipeline() {
        let out = pipeline_to_mermaid(&PipelineDefinition::new("p")).unwrap();
        assert_eq!(out, "graph LR\n");
    }
}
