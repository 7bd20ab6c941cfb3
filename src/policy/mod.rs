//! C4: policy parsing/validation and the indexed policy stores (spec.md
//! §3.2, §3.4, §4.9).

pub mod parser;
pub mod store;
pub mod types;

pub use parser::{parse_json, parse_json_with_warnings, parse_yaml, parse_yaml_with_warnings};
pub use store::{PolicyStore, PolicyStoreStats};
pub use types::{
    ActionPattern, ExportConstantsPolicy, ExportVariablesPolicy, LoadedPolicy, PolicyMetadata,
    PolicyVariables, PrincipalPolicy, PrincipalPolicyAction, PrincipalPolicyRule, ResourcePolicy, Rule,
};
