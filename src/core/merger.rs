//! Parameter merging.
//!
//! Whenever a parameter has to be attached to a transitioning state, or a
//! per-call parameter has to be combined with the controller's shared one,
//! the engine asks a [`ParameterMerger`] to combine the two values.

use serde_json::Value;

/// Combines two optional parameters into one.
///
/// `base` is the value already held (the shared parameter, or the state's
/// stored parameter); `incoming` is the newer value. Implementations decide
/// precedence; the built-in mergers let `incoming` win.
pub trait ParameterMerger<P> {
    fn merge(&self, base: Option<P>, incoming: Option<P>) -> Option<P>;
}

impl<P, F> ParameterMerger<P> for F
where
    F: Fn(Option<P>, Option<P>) -> Option<P>,
{
    fn merge(&self, base: Option<P>, incoming: Option<P>) -> Option<P> {
        self(base, incoming)
    }
}

/// Keeps `incoming` when present, otherwise `base`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReplaceMerger;

impl<P> ParameterMerger<P> for ReplaceMerger {
    fn merge(&self, base: Option<P>, incoming: Option<P>) -> Option<P> {
        incoming.or(base)
    }
}

/// Shallow merge of JSON objects.
///
/// Keys from `incoming` overwrite keys in `base`. When either side is not an
/// object the incoming value replaces the base value.
///
/// ```rust
/// use flagstate::core::{JsonMerger, ParameterMerger};
/// use serde_json::json;
///
/// let merged = JsonMerger.merge(Some(json!({"a": 1, "b": 1})), Some(json!({"b": 2})));
/// assert_eq!(merged, Some(json!({"a": 1, "b": 2})));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonMerger;

impl ParameterMerger<Value> for JsonMerger {
    fn merge(&self, base: Option<Value>, incoming: Option<Value>) -> Option<Value> {
        match (base, incoming) {
            (Some(Value::Object(mut base)), Some(Value::Object(incoming))) => {
                base.extend(incoming);
                Some(Value::Object(base))
            }
            (base, incoming) => incoming.or(base),
        }
    }
}
