//! Parses the shared sample introspection document.

use dataproxy_core::{FieldKind, IntrospectionDocument, TypeLocation};

const SAMPLE: &str = include_str!("../../../fixtures/sample_dmmf.json");

fn sample() -> IntrospectionDocument {
    IntrospectionDocument::from_json(SAMPLE).expect("sample document should parse")
}

#[test]
fn parses_models_and_relations() {
    let doc = sample();
    let names: Vec<_> = doc.datamodel.models.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["User", "Team", "LeaderboardRow"]);

    let user = doc.model("User").unwrap();
    let team = user.field("Team").unwrap();
    assert_eq!(team.kind, FieldKind::Object);
    assert_eq!(team.relation_from_fields, vec!["teamId"]);
    assert_eq!(team.relation_to_fields, vec!["id"]);
    assert_eq!(user.field("id").unwrap().default_function(), Some("autoincrement"));
}

#[test]
fn composite_key_is_exposed_in_key_order() {
    let doc = sample();
    let row = doc.model("LeaderboardRow").unwrap();
    let ids = row.identifying_fields();
    let names: Vec<_> = ids.iter().map(|f| f.name.as_str()).collect();

    assert_eq!(names, vec!["leaderboardId", "userId"]);
    assert_eq!(row.compound_key_name(&ids), "leaderboardId_userId");
}

#[test]
fn object_types_list_engine_types_first() {
    let doc = sample();
    let first = doc.object_types().next().unwrap();
    assert_eq!(first.name, "Query");

    let last = doc.object_types().last().unwrap();
    assert_eq!(last.name, "LeaderboardRow");

    let language = doc
        .object_type("Team")
        .and_then(|t| t.field("language"))
        .unwrap();
    assert_eq!(language.output_type.location, TypeLocation::EnumTypes);
    assert!(language.output_type.is_list);
}

#[test]
fn every_mapped_root_field_is_declared_on_query_or_mutation() {
    let doc = sample();
    let query = doc.object_type("Query").unwrap();
    let mutation = doc.object_type("Mutation").unwrap();

    let mut count = 0;
    for (model, _operation, field) in doc.operations() {
        assert!(doc.model(model).is_some());
        assert!(
            query.field(field).is_some() || mutation.field(field).is_some(),
            "{field} is not a root field"
        );
        count += 1;
    }
    assert_eq!(count, 42);
    let others: Vec<&str> = doc.mappings.other_operations.iter().map(String::as_str).collect();
    assert_eq!(others, vec!["executeRaw", "queryRaw"]);
}
