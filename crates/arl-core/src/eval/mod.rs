//! In-memory evaluation of logical expressions against typed AAS objects.

pub mod context;
pub mod descriptors;
pub mod evaluator;

pub use context::{AttributeSource, EvalContext};
pub use descriptors::{
    AasDescriptor, Endpoint, EvalTarget, Key, ProtocolInformation, Reference, SpecificAssetId,
    Submodel, SubmodelDescriptor, SubmodelElement,
};
pub use evaluator::{evaluate, evaluate_with_options};
