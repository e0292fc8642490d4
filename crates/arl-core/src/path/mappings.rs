//! Static segment and column tables for the field-identifier resolver.
//!
//! Process-wide, immutable, shared across all compilations. Extending the
//! language to a new root or segment means adding rows here, not widening
//! any dispatch.

use crate::error::ResolveError;

/// Projection of the polymorphic property value columns as text.
pub const SME_VALUE_EXPR: &str = "COALESCE(property_element.value_text, \
     property_element.value_num::text, \
     property_element.value_bool::text, \
     property_element.value_time::text, \
     property_element.value_datetime::text)";

/// The seven roots of the path DSL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Root {
    AasDescriptor,
    SmDescriptor,
    Shell,
    Submodel,
    SubmodelElement,
    ConceptDescription,
    Discovery,
}

impl Root {
    /// Map a `$<root>` tag to its root, if known.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "$aasdesc" => Some(Self::AasDescriptor),
            "$smdesc" => Some(Self::SmDescriptor),
            "$aas" => Some(Self::Shell),
            "$sm" => Some(Self::Submodel),
            "$sme" => Some(Self::SubmodelElement),
            "$cd" => Some(Self::ConceptDescription),
            "$bd" => Some(Self::Discovery),
            _ => None,
        }
    }

    /// The table alias whose columns need no join from the root row.
    pub fn natural_alias(&self) -> &'static str {
        match self {
            Self::AasDescriptor => "aas_descriptor",
            Self::SmDescriptor => "submodel_descriptor",
            Self::Shell | Self::Discovery => "aas_identifier",
            Self::Submodel => "submodel",
            Self::SubmodelElement => "submodel_element",
            Self::ConceptDescription => "concept_description",
        }
    }

    /// The outer row's primary key, used for EXISTS correlation and as the
    /// CTE `root_id`.
    pub fn outer_key(&self) -> &'static str {
        match self {
            Self::AasDescriptor | Self::SmDescriptor => "descriptor.id",
            Self::Shell | Self::Discovery => "aas_identifier.id",
            Self::Submodel => "submodel.id",
            Self::SubmodelElement => "submodel_element.id",
            Self::ConceptDescription => "concept_description.id",
        }
    }

    /// The walk context this root starts in.
    pub fn context(&self) -> Context {
        match self {
            Self::AasDescriptor => Context::AasDescriptor,
            Self::SmDescriptor => Context::SubmodelDescriptor,
            Self::Shell => Context::Shell,
            Self::Submodel => Context::Submodel,
            Self::SubmodelElement => Context::SubmodelElement,
            Self::ConceptDescription => Context::ConceptDescription,
            Self::Discovery => Context::Discovery,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::AasDescriptor => "$aasdesc",
            Self::SmDescriptor => "$smdesc",
            Self::Shell => "$aas",
            Self::Submodel => "$sm",
            Self::SubmodelElement => "$sme",
            Self::ConceptDescription => "$cd",
            Self::Discovery => "$bd",
        }
    }
}

/// The rolling context of the resolver's token walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Context {
    AasDescriptor,
    SubmodelDescriptor,
    Shell,
    Submodel,
    SubmodelElement,
    ConceptDescription,
    Discovery,
    SpecificAssetId,
    Endpoint { alias: &'static str },
    ReferenceKey { alias: &'static str },
}

impl Context {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::AasDescriptor => "AAS descriptors",
            Self::SubmodelDescriptor => "submodel descriptors",
            Self::Shell => "shells",
            Self::Submodel => "submodels",
            Self::SubmodelElement => "submodel elements",
            Self::ConceptDescription => "concept descriptions",
            Self::Discovery => "discovery entries",
            Self::SpecificAssetId => "specific asset ids",
            Self::Endpoint { .. } => "endpoints",
            Self::ReferenceKey { .. } => "reference keys",
        }
    }
}

/// Mapping for one array segment: which table the array rows live in and
/// which context the walk continues in.
///
/// A mapping with `parent: None` is selected by `(segment, context)` alone;
/// one with `parent: Some(..)` also requires the immediately preceding
/// simple segment, which disambiguates e.g. semantic-id references from
/// external-subject references.
#[derive(Debug)]
pub struct SegmentMapping {
    pub segment: &'static str,
    pub context: Context,
    pub parent: Option<&'static str>,
    pub position_alias: &'static str,
    pub next: Context,
}

static SEGMENT_MAPPINGS: &[SegmentMapping] = &[
    SegmentMapping {
        segment: "specificAssetIds",
        context: Context::AasDescriptor,
        parent: None,
        position_alias: "specific_asset_id.position",
        next: Context::SpecificAssetId,
    },
    SegmentMapping {
        segment: "specificAssetIds",
        context: Context::Shell,
        parent: None,
        position_alias: "specific_asset_id.position",
        next: Context::SpecificAssetId,
    },
    SegmentMapping {
        segment: "assetLinks",
        context: Context::Discovery,
        parent: None,
        position_alias: "specific_asset_id.position",
        next: Context::SpecificAssetId,
    },
    SegmentMapping {
        segment: "endpoints",
        context: Context::AasDescriptor,
        parent: None,
        position_alias: "aas_descriptor_endpoint.position",
        next: Context::Endpoint {
            alias: "aas_descriptor_endpoint",
        },
    },
    SegmentMapping {
        segment: "endpoints",
        context: Context::SubmodelDescriptor,
        parent: None,
        position_alias: "submodel_descriptor_endpoint.position",
        next: Context::Endpoint {
            alias: "submodel_descriptor_endpoint",
        },
    },
    SegmentMapping {
        segment: "submodelDescriptors",
        context: Context::AasDescriptor,
        parent: None,
        position_alias: "submodel_descriptor.position",
        next: Context::SubmodelDescriptor,
    },
    SegmentMapping {
        segment: "submodelElements",
        context: Context::Submodel,
        parent: None,
        position_alias: "submodel_element.position",
        next: Context::SubmodelElement,
    },
    SegmentMapping {
        segment: "keys",
        context: Context::Submodel,
        parent: Some("semanticId"),
        position_alias: "semantic_id_reference_key.position",
        next: Context::ReferenceKey {
            alias: "semantic_id_reference_key",
        },
    },
    SegmentMapping {
        segment: "keys",
        context: Context::SubmodelDescriptor,
        parent: Some("semanticId"),
        position_alias: "sm_semantic_id_reference_key.position",
        next: Context::ReferenceKey {
            alias: "sm_semantic_id_reference_key",
        },
    },
    SegmentMapping {
        segment: "keys",
        context: Context::SubmodelElement,
        parent: Some("semanticId"),
        position_alias: "sme_semantic_id_reference_key.position",
        next: Context::ReferenceKey {
            alias: "sme_semantic_id_reference_key",
        },
    },
    SegmentMapping {
        segment: "keys",
        context: Context::SpecificAssetId,
        parent: Some("externalSubjectId"),
        position_alias: "external_subject_reference_key.position",
        next: Context::ReferenceKey {
            alias: "external_subject_reference_key",
        },
    },
];

/// Look up the mapping for an array segment in a context, honoring the
/// parent requirement of `ByParent` rows.
pub fn segment_mapping(
    segment: &str,
    context: Context,
    parent: Option<&str>,
) -> Result<&'static SegmentMapping, ResolveError> {
    let mut known_segment = false;
    let mut known_in_context = false;

    for mapping in SEGMENT_MAPPINGS {
        if mapping.segment != segment {
            continue;
        }
        known_segment = true;
        if mapping.context != context {
            continue;
        }
        known_in_context = true;
        match mapping.parent {
            None => return Ok(mapping),
            Some(required) if parent == Some(required) => return Ok(mapping),
            Some(_) => {}
        }
    }

    if !known_segment {
        Err(ResolveError::UnsupportedSegment(segment.to_string()))
    } else if !known_in_context {
        Err(ResolveError::SegmentInvalidInContext {
            segment: segment.to_string(),
            context: context.describe(),
        })
    } else {
        Err(ResolveError::MissingParentForSegment(segment.to_string()))
    }
}

/// Mapping from a terminal field (the simple segments after the last
/// array) to its table-qualified column or expression.
pub struct FieldColumn {
    pub context: Context,
    pub field: &'static str,
    pub column: &'static str,
}

static FIELD_COLUMNS: &[FieldColumn] = &[
    // AAS descriptors
    FieldColumn { context: Context::AasDescriptor, field: "id", column: "aas_descriptor.id" },
    FieldColumn { context: Context::AasDescriptor, field: "idShort", column: "aas_descriptor.id_short" },
    FieldColumn { context: Context::AasDescriptor, field: "assetKind", column: "aas_descriptor.asset_kind" },
    FieldColumn { context: Context::AasDescriptor, field: "assetType", column: "aas_descriptor.asset_type" },
    FieldColumn { context: Context::AasDescriptor, field: "globalAssetId", column: "aas_descriptor.global_asset_id" },
    // Submodel descriptors (root and nested under an AAS descriptor)
    FieldColumn { context: Context::SubmodelDescriptor, field: "id", column: "submodel_descriptor.id" },
    FieldColumn { context: Context::SubmodelDescriptor, field: "idShort", column: "submodel_descriptor.id_short" },
    // Shells
    FieldColumn { context: Context::Shell, field: "id", column: "aas_identifier.id" },
    FieldColumn { context: Context::Shell, field: "globalAssetId", column: "aas_identifier.global_asset_id" },
    // Discovery
    FieldColumn { context: Context::Discovery, field: "aasId", column: "aas_identifier.id" },
    // Submodels
    FieldColumn { context: Context::Submodel, field: "id", column: "submodel.id" },
    FieldColumn { context: Context::Submodel, field: "idShort", column: "submodel.id_short" },
    FieldColumn { context: Context::Submodel, field: "kind", column: "submodel.kind" },
    // Submodel elements
    FieldColumn { context: Context::SubmodelElement, field: "idShort", column: "submodel_element.id_short" },
    FieldColumn { context: Context::SubmodelElement, field: "idShortPath", column: "submodel_element.idshort_path" },
    FieldColumn { context: Context::SubmodelElement, field: "modelType", column: "submodel_element.model_type" },
    FieldColumn { context: Context::SubmodelElement, field: "value", column: SME_VALUE_EXPR },
    // Concept descriptions
    FieldColumn { context: Context::ConceptDescription, field: "id", column: "concept_description.id" },
    FieldColumn { context: Context::ConceptDescription, field: "idShort", column: "concept_description.id_short" },
    // Specific asset ids (registry, shell, and discovery walks)
    FieldColumn { context: Context::SpecificAssetId, field: "name", column: "specific_asset_id.name" },
    FieldColumn { context: Context::SpecificAssetId, field: "value", column: "specific_asset_id.value" },
    // Endpoints
    FieldColumn {
        context: Context::Endpoint { alias: "aas_descriptor_endpoint" },
        field: "interface",
        column: "aas_descriptor_endpoint.interface",
    },
    FieldColumn {
        context: Context::Endpoint { alias: "aas_descriptor_endpoint" },
        field: "protocolInformation.href",
        column: "aas_descriptor_endpoint.href",
    },
    FieldColumn {
        context: Context::Endpoint { alias: "submodel_descriptor_endpoint" },
        field: "interface",
        column: "submodel_descriptor_endpoint.interface",
    },
    FieldColumn {
        context: Context::Endpoint { alias: "submodel_descriptor_endpoint" },
        field: "protocolInformation.href",
        column: "submodel_descriptor_endpoint.href",
    },
    // Reference keys
    FieldColumn {
        context: Context::ReferenceKey { alias: "semantic_id_reference_key" },
        field: "value",
        column: "semantic_id_reference_key.value",
    },
    FieldColumn {
        context: Context::ReferenceKey { alias: "semantic_id_reference_key" },
        field: "type",
        column: "semantic_id_reference_key.type",
    },
    FieldColumn {
        context: Context::ReferenceKey { alias: "sm_semantic_id_reference_key" },
        field: "value",
        column: "sm_semantic_id_reference_key.value",
    },
    FieldColumn {
        context: Context::ReferenceKey { alias: "sm_semantic_id_reference_key" },
        field: "type",
        column: "sm_semantic_id_reference_key.type",
    },
    FieldColumn {
        context: Context::ReferenceKey { alias: "sme_semantic_id_reference_key" },
        field: "value",
        column: "sme_semantic_id_reference_key.value",
    },
    FieldColumn {
        context: Context::ReferenceKey { alias: "sme_semantic_id_reference_key" },
        field: "type",
        column: "sme_semantic_id_reference_key.type",
    },
    FieldColumn {
        context: Context::ReferenceKey { alias: "external_subject_reference_key" },
        field: "value",
        column: "external_subject_reference_key.value",
    },
    FieldColumn {
        context: Context::ReferenceKey { alias: "external_subject_reference_key" },
        field: "type",
        column: "external_subject_reference_key.type",
    },
];

/// Terminal column for `(context, field)`, where `field` is the trailing
/// simple segments joined with `.`.
pub fn field_column(context: Context, field: &str) -> Result<&'static str, ResolveError> {
    if let Some(row) = FIELD_COLUMNS
        .iter()
        .find(|row| row.context == context && row.field == field)
    {
        return Ok(row.column);
    }

    // Known anywhere else → wrong context; unknown everywhere → unsupported.
    if FIELD_COLUMNS.iter().any(|row| row.field == field) {
        Err(ResolveError::SegmentInvalidInContext {
            segment: field.to_string(),
            context: context.describe(),
        })
    } else {
        Err(ResolveError::UnsupportedSegment(field.to_string()))
    }
}
