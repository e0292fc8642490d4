//! Typed AAS structures for in-memory rule evaluation.
//!
//! Field names follow the AAS JSON serialization (camelCase), so the same
//! path DSL segments that drive the SQL resolver address these structs.

use serde::{Deserialize, Serialize};

/// One key of a reference.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Key {
    #[serde(rename = "type")]
    pub key_type: String,
    pub value: String,
}

/// A model or external reference.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Reference {
    pub keys: Vec<Key>,
}

impl Reference {
    pub fn external(value: impl Into<String>) -> Self {
        Self {
            keys: vec![Key {
                key_type: "GlobalReference".into(),
                value: value.into(),
            }],
        }
    }
}

/// A specific asset id with its optional subject restriction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpecificAssetId {
    pub name: String,
    pub value: String,
    pub external_subject_id: Option<Reference>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProtocolInformation {
    pub href: String,
}

/// A descriptor endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Endpoint {
    pub interface: String,
    pub protocol_information: ProtocolInformation,
}

/// A submodel descriptor (standalone or nested in an AAS descriptor).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmodelDescriptor {
    pub id: String,
    pub id_short: Option<String>,
    pub semantic_id: Option<Reference>,
    pub endpoints: Vec<Endpoint>,
}

/// An AAS descriptor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AasDescriptor {
    pub id: String,
    pub id_short: Option<String>,
    pub asset_kind: Option<String>,
    pub asset_type: Option<String>,
    pub global_asset_id: Option<String>,
    pub specific_asset_ids: Vec<SpecificAssetId>,
    pub endpoints: Vec<Endpoint>,
    pub submodel_descriptors: Vec<SubmodelDescriptor>,
}

/// A submodel element, addressed by its idShort path.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmodelElement {
    pub id_short: String,
    pub id_short_path: String,
    pub model_type: Option<String>,
    /// Textual projection of the element's value, as the SQL side exposes
    /// it.
    pub value: Option<String>,
    pub semantic_id: Option<Reference>,
}

/// A submodel.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Submodel {
    pub id: String,
    pub id_short: Option<String>,
    pub kind: Option<String>,
    pub semantic_id: Option<Reference>,
    pub submodel_elements: Vec<SubmodelElement>,
}

/// The object a rule formula is evaluated against.
#[derive(Clone, Debug, PartialEq)]
pub enum EvalTarget {
    AasDescriptor(AasDescriptor),
    SubmodelDescriptor(SubmodelDescriptor),
    Submodel(Submodel),
    SubmodelElement(SubmodelElement),
}

impl EvalTarget {
    /// The path-DSL root tag this target answers to.
    pub fn root_tag(&self) -> &'static str {
        match self {
            Self::AasDescriptor(_) => "$aasdesc",
            Self::SubmodelDescriptor(_) => "$smdesc",
            Self::Submodel(_) => "$sm",
            Self::SubmodelElement(_) => "$sme",
        }
    }
}
