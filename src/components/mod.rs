// Request Components
//
// A component is a mutable key/value view over one part of a request:
//
// - query: URL query parameters
// - headers: request headers
// - body: JSON leaves (dotted keys) or form-encoded fields
// - path: URL path segments (1-based index keys)
//
// Every component parses its state out of a FuzzRequest once, is mutated in
// place by the rule engine and serializes the current state back with
// `rebuild`.

pub mod body;
pub mod headers;
pub mod path;
pub mod query;

pub use body::BodyComponent;
pub use headers::HeaderComponent;
pub use path::PathComponent;
pub use query::QueryComponent;

use crate::error::FuzzError;
use crate::models::{FuzzRequest, PartKind};

/// Iterate / mutate / rebuild contract over one request part
pub trait Component {
    /// Part category this component covers
    fn kind(&self) -> PartKind;

    /// Current (key, value) pairs in a stable order
    fn iterate(&self) -> Vec<(String, String)>;

    /// Replace the value at `key`; `InvalidKey` if the key is gone
    fn set_value(&mut self, key: &str, value: &str) -> Result<(), FuzzError>;

    /// Replace the value of the part yielded at `position` by `iterate`.
    ///
    /// Components that may yield the same key more than once must override
    /// this so each occurrence is addressed on its own. The default relies
    /// on keys being unique.
    fn set_value_at(&mut self, _position: usize, key: &str, value: &str) -> Result<(), FuzzError> {
        self.set_value(key, value)
    }

    /// Serialize current state into a concrete request
    fn rebuild(&self) -> Result<FuzzRequest, FuzzError>;

    fn value(&self, key: &str) -> Option<String> {
        self.iterate()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

/// Write `value` into the entry at `position` if it still carries `key`
pub(crate) fn set_pair_at(
    pairs: &mut [(String, String)],
    position: usize,
    key: &str,
    value: &str,
    same_key: impl Fn(&str, &str) -> bool,
) -> Result<(), FuzzError> {
    match pairs.get_mut(position) {
        Some((k, v)) if same_key(k, key) => {
            *v = value.to_string();
            Ok(())
        }
        _ => Err(FuzzError::InvalidKey(key.to_string())),
    }
}

/// Build the component covering `kind` for `request`
pub fn component_for(kind: PartKind, request: &FuzzRequest) -> Result<Box<dyn Component>, FuzzError> {
    Ok(match kind {
        PartKind::Query => Box::new(QueryComponent::parse(request)?),
        PartKind::Header => Box::new(HeaderComponent::parse(request)),
        PartKind::Body => Box::new(BodyComponent::parse(request)?),
        PartKind::Path => Box::new(PathComponent::parse(request)?),
    })
}
