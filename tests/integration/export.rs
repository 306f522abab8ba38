use varhydrate::core::Variable;
use varhydrate::export::{VariableExport, find_dependents};
use varhydrate::graph::ReferenceSyntax;
use varhydrate::test_utils::org_variables;

fn names(variables: &[Variable]) -> Vec<&str> {
    variables.iter().map(|v| v.name.as_str()).collect()
}

/// X references Y and Y references Z: exporting X carries both
#[test]
fn test_export_carries_transitive_dependencies() {
    let all = vec![
        Variable::query("x", "X", "from($(Y))"),
        Variable::query("y", "Y", "from($(Z))"),
        Variable::constant("z", "Z", ["1"]),
        Variable::constant("w", "W", ["unused"]),
    ];

    let export = VariableExport::new(all[0].clone(), &all, ReferenceSyntax::Dollar);
    assert_eq!(export.variable.name, "X");
    assert_eq!(export.dependency_names(), vec!["Y", "Z"]);

    let y = find_dependents(&all[1], &all, ReferenceSyntax::Dollar);
    assert_eq!(names(&y), vec!["Z"]);
    assert!(find_dependents(&all[2], &all, ReferenceSyntax::Dollar).is_empty());
}

#[test]
fn test_export_terminates_on_cycles() {
    let all = vec![
        Variable::query("a", "a", "q($(b))"),
        Variable::query("b", "b", "q($(c))"),
        Variable::query("c", "c", "q($(a))"),
    ];

    let dependents = find_dependents(&all[0], &all, ReferenceSyntax::Dollar);
    assert_eq!(names(&dependents), vec!["b", "c"]);
}

#[test]
fn test_export_ignores_unknown_names() {
    let all = vec![Variable::query("a", "a", "q($(missing), $(b))"), Variable::constant("b", "b", ["1"])];

    let dependents = find_dependents(&all[0], &all, ReferenceSyntax::Dollar);
    assert_eq!(names(&dependents), vec!["b"]);
}

#[test]
fn test_export_serializes_whole_bundle() {
    let all = org_variables();
    let field = all.iter().find(|v| v.name == "field").unwrap().clone();

    let export = VariableExport::new(field, &all, ReferenceSyntax::Dollar);
    let json = serde_json::to_value(&export).unwrap();

    assert_eq!(json["variable"]["name"], "field");
    let dependencies = json["dependencies"].as_array().unwrap();
    assert_eq!(dependencies.len(), 2);
    assert_eq!(dependencies[0]["name"], "bucket");
    assert_eq!(dependencies[1]["name"], "measurement");

    let parsed: VariableExport = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, export);
}
