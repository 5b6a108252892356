use crate::resource::ResourceType;

/// Recognized shapes of a bare resource identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdShape {
    /// `i-` prefixed compute instance id.
    ComputeInstance,
    /// `vol-` prefixed block volume id.
    BlockVolume,
    /// Fully qualified provider resource name.
    Arn,
    /// `cluster/service` pair.
    ClusterService,
    /// Anything else; resolved by trying adapters in turn.
    Unqualified,
}

struct IdShapeRule {
    shape: IdShape,
    matches: fn(&str) -> bool,
}

// Evaluated top to bottom; the first matching rule wins.
const ID_SHAPE_RULES: &[IdShapeRule] = &[
    IdShapeRule {
        shape: IdShape::ComputeInstance,
        matches: is_compute_instance_id,
    },
    IdShapeRule {
        shape: IdShape::BlockVolume,
        matches: is_block_volume_id,
    },
    IdShapeRule {
        shape: IdShape::Arn,
        matches: is_arn,
    },
    IdShapeRule {
        shape: IdShape::ClusterService,
        matches: is_cluster_service_pair,
    },
];

const FALLBACK_ORDER: &[ResourceType] = &[
    ResourceType::Database,
    ResourceType::ObjectStore,
    ResourceType::Function,
];

fn is_compute_instance_id(id: &str) -> bool {
    id.starts_with("i-")
}

fn is_block_volume_id(id: &str) -> bool {
    id.starts_with("vol-")
}

fn is_arn(id: &str) -> bool {
    id.starts_with("arn:")
}

fn is_cluster_service_pair(id: &str) -> bool {
    match id.split_once('/') {
        Some((cluster, service)) => {
            !cluster.is_empty() && !service.is_empty() && !service.contains('/')
        }
        None => false,
    }
}

/// Classifies a bare identifier by its shape.
#[must_use]
pub fn classify_resource_id(resource_id: &str) -> IdShape {
    ID_SHAPE_RULES
        .iter()
        .find(|rule| (rule.matches)(resource_id))
        .map(|rule| rule.shape)
        .unwrap_or(IdShape::Unqualified)
}

/// Returns the resource types worth probing for an identifier, in order.
///
/// An empty result means the identifier cannot belong to any known type.
#[must_use]
pub fn candidate_resource_types(resource_id: &str) -> Vec<ResourceType> {
    let resource_id = resource_id.trim();
    if resource_id.is_empty() {
        return Vec::new();
    }

    match classify_resource_id(resource_id) {
        IdShape::ComputeInstance => vec![ResourceType::Compute],
        IdShape::BlockVolume => vec![ResourceType::BlockVolume],
        IdShape::Arn => arn_resource_type(resource_id).into_iter().collect(),
        IdShape::ClusterService => vec![ResourceType::ContainerService],
        IdShape::Unqualified => FALLBACK_ORDER.to_vec(),
    }
}

// arn:partition:service:region:account:resource
fn arn_resource_type(arn: &str) -> Option<ResourceType> {
    let mut segments = arn.splitn(6, ':');
    let service = segments.nth(2)?;
    let resource = segments.nth(2)?;

    match service {
        "ec2" if resource.starts_with("instance/") => Some(ResourceType::Compute),
        "ec2" if resource.starts_with("volume/") => Some(ResourceType::BlockVolume),
        "rds" => Some(ResourceType::Database),
        "s3" => Some(ResourceType::ObjectStore),
        "ecs" => Some(ResourceType::ContainerService),
        "lambda" => Some(ResourceType::Function),
        _ => None,
    }
}
