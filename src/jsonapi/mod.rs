//! JSON:API wire format: error envelopes, links and resource documents.

pub mod errors;
pub mod links;
pub mod serializer;

pub use errors::{ErrorDocument, ErrorObject, RequestContext, Rule, ValidationErrors};
pub use links::LinkBuilder;
pub use serializer::{Included, Serializer, Transformer};

pub const JSON_API_MEDIA_TYPE: &str = "application/vnd.api+json";
