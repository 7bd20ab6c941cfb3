//! Custom CEL built-ins beyond what `cel_interpreter`'s standard library
//! already provides (`size`, `startsWith`, `endsWith`, `contains`,
//! `matches`) — spec.md §4.2 additionally requires `type(x)`, which has no
//! standard-library equivalent.

use cel_interpreter::objects::Value as CelValue;
use cel_interpreter::Context;

/// `type(x)` — the CEL type name of a value, as a string.
fn cel_type(value: CelValue) -> String {
    match value {
        CelValue::Null => "null",
        CelValue::Bool(_) => "bool",
        CelValue::Int(_) => "int",
        CelValue::UInt(_) => "uint",
        CelValue::Float(_) => "double",
        CelValue::String(_) => "string",
        CelValue::Bytes(_) => "bytes",
        CelValue::List(_) => "list",
        CelValue::Map(_) => "map",
        CelValue::Function(_, _) => "function",
        CelValue::Duration(_) => "duration",
        CelValue::Timestamp(_) => "timestamp",
    }
    .to_string()
}

/// Register the custom built-ins into a fresh evaluation context.
pub fn register(context: &mut Context) {
    context.add_function("type", cel_type);
}
