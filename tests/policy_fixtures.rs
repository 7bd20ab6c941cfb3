//! Parses policy documents staged on disk, the way a caller that hot-loads
//! policy files (not this crate's job — see the non-goals) would still want
//! its own fixture-loading tests to look.

use std::io::Write;

use authz_core::policy::LoadedPolicy;

#[test]
fn parses_a_resource_policy_from_a_temp_yaml_file() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(
        file,
        r#"
apiVersion: authz.engine/v1
kind: ResourcePolicy
metadata:
  name: document-policy
spec:
  resource: document
  rules:
    - actions: ["read"]
      effect: allow
"#
    )
    .unwrap();

    let contents = std::fs::read_to_string(file.path()).unwrap();
    let loaded = authz_core::policy::parse_yaml(&contents).unwrap();
    let LoadedPolicy::Resource(policy) = loaded else {
        panic!("expected a resource policy");
    };
    assert_eq!(policy.resource, "document");
    assert_eq!(policy.rules.len(), 1);
}
