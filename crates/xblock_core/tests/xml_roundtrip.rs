use serde_json::json;
use std::sync::Arc;
use xblock_core::markup::{parse_fragments, parse_str};
use xblock_core::serialization::export_xml;
use xblock_core::{
    parse_xml_forest, parse_xml_str, BlockClass, BlockError, ChildPolicy, ChildResolution,
    ClassRegistry, ExportContext, Field, FieldError, MemoryKeyValueStore, Runtime, Scope,
    WorkbenchRuntime, XmlError,
};

fn registry(policy: ChildPolicy) -> ClassRegistry {
    let mut registry = ClassRegistry::new();
    registry
        .register(
            BlockClass::builder("html")
                .field(Field::string("content", Scope::Content))
                .field(Field::integer("weight", Scope::Settings).with_default(1))
                .field(Field::integer("count", Scope::Settings))
                .field(Field::integer("score", Scope::Settings).enforce_type())
                .field(Field::string("label", Scope::Settings).xml_node())
                .build(),
        )
        .unwrap();
    registry
        .register(
            BlockClass::builder("vertical")
                .has_children(true)
                .child_policy(policy)
                .build(),
        )
        .unwrap();
    registry
}

fn runtime(policy: ChildPolicy) -> Arc<WorkbenchRuntime> {
    WorkbenchRuntime::builder(Arc::new(MemoryKeyValueStore::new()), registry(policy)).build()
}

#[test]
fn name_and_tags_survive_a_round_trip() {
    let source = runtime(ChildPolicy::Inline);
    let mut block = source.create_block("html").unwrap();
    block.set("name", "Intro").unwrap();
    block.set("tags", json!(["a", "b"])).unwrap();
    block.save().unwrap();

    let text = export_xml(&mut block, &mut ExportContext::default()).unwrap();
    assert!(text.starts_with("<html "));
    assert!(text.contains("xmlns:option=\"http://code.edx.org/xblock/option\""));

    let target = runtime(ChildPolicy::Inline);
    let usage_id = parse_xml_str(target.as_ref(), &text).unwrap();
    let mut copy = target.get_block(&usage_id).unwrap();
    assert_eq!(copy.name().unwrap().as_deref(), Some("Intro"));
    assert_eq!(copy.tags().unwrap(), vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn serialize_parse_serialize_is_stable() {
    let runtime = runtime(ChildPolicy::Inline);
    let usage_id = parse_xml_str(
        runtime.as_ref(),
        r#"<vertical name="Unit 1">
            <html weight="3">Welcome &amp; hello</html>
            <html name="Second"/>
        </vertical>"#,
    )
    .unwrap();

    let mut first = runtime.get_block(&usage_id).unwrap();
    let exported = first.to_markup(&mut ExportContext::default()).unwrap();
    let reparsed = parse_str(&exported.to_xml_string()).unwrap();
    assert_eq!(reparsed, exported);

    let copy_id = parse_xml_str(runtime.as_ref(), &exported.to_xml_string()).unwrap();
    let mut copy = runtime.get_block(&copy_id).unwrap();
    let exported_again = copy.to_markup(&mut ExportContext::default()).unwrap();
    assert_eq!(exported_again, exported);
    assert_eq!(exported.children[0].text.as_deref(), Some("Welcome & hello"));
    assert_eq!(exported.children[0].attribute("weight"), Some("3"));
}

#[test]
fn unknown_attributes_are_preserved_verbatim() {
    let runtime = runtime(ChildPolicy::Inline);
    let usage_id = parse_xml_str(
        runtime.as_ref(),
        r#"<html name="x" data-theme="dark" url_name="intro"/>"#,
    )
    .unwrap();

    let mut block = runtime.get_block(&usage_id).unwrap();
    assert_eq!(
        block.extra_attributes(),
        &[("data-theme".to_string(), "dark".to_string())]
    );
    assert_eq!(block.scope_ids().def_id(), "intro");

    let node = block.to_markup(&mut ExportContext::default()).unwrap();
    assert_eq!(node.attribute("data-theme"), Some("dark"));
    assert_eq!(node.attribute("name"), Some("x"));
}

#[test]
fn malformed_field_aborts_only_its_own_node_in_a_forest() {
    let runtime = runtime(ChildPolicy::Inline);
    let nodes = parse_fragments(
        r#"<html name="first"/>
        <html weight="heavy"/>
        <vertical><html name="third"/></vertical>"#,
    )
    .unwrap();

    let results = parse_xml_forest(runtime.as_ref(), &nodes);
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(matches!(
        &results[1],
        Err(BlockError::Xml(XmlError::Field {
            source: FieldError::Deserialize { .. },
            ..
        }))
    ));

    let mut third = runtime.get_block(results[2].as_ref().unwrap()).unwrap();
    assert_eq!(third.children_ids().unwrap().len(), 1);
}

#[test]
fn malformed_child_aborts_the_parent() {
    let runtime = runtime(ChildPolicy::Inline);
    let err = parse_xml_str(
        runtime.as_ref(),
        r#"<vertical><html weight="[1"/></vertical>"#,
    )
    .unwrap_err();
    assert!(matches!(err, BlockError::Xml(XmlError::Field { .. })));
}

#[test]
fn syntax_errors_are_reported() {
    let runtime = runtime(ChildPolicy::Inline);
    let err = parse_xml_str(runtime.as_ref(), "<vertical><html></vertical>").unwrap_err();
    assert!(matches!(err, BlockError::Xml(XmlError::Syntax(_))));
}

#[test]
fn pointer_children_round_trip_through_the_resolver() {
    let source = runtime(ChildPolicy::Pointer);
    let usage_id = parse_xml_str(
        source.as_ref(),
        r#"<vertical name="Unit">
            <html name="one">First</html>
            <html name="two">Second</html>
        </vertical>"#,
    )
    .unwrap();

    let mut unit = source.get_block(&usage_id).unwrap();
    let mut context = ExportContext::default();
    let node = unit.to_markup(&mut context).unwrap();
    assert_eq!(node.children.len(), 2);
    assert!(node.children.iter().all(|child| child.is_pointer()));
    assert_eq!(context.pointers().len(), 2);

    let target = runtime(ChildPolicy::Pointer);
    target.pointer_store().publish(context.pointers()).unwrap();
    let copy_id = parse_xml_str(target.as_ref(), &node.to_xml_string()).unwrap();

    let mut copy = target.get_block(&copy_id).unwrap();
    let mut children = copy.get_children().unwrap();
    let names: Vec<Option<String>> = children
        .iter_mut()
        .map(|child| child.name().unwrap())
        .collect();
    assert_eq!(names, vec![Some("one".to_string()), Some("two".to_string())]);
    assert_eq!(children[1].get("content").unwrap(), json!("Second"));
    assert_eq!(
        children[0].scope_ids().def_id(),
        node.children[0].attribute("url_name").unwrap()
    );
}

#[test]
fn unresolvable_children_fail_strict_export_and_are_skipped_when_lenient() {
    let runtime = runtime(ChildPolicy::Inline);
    let mut unit = runtime.create_block("vertical").unwrap();
    let child = runtime.create_block("html").unwrap();
    unit.add_child(child.usage_id()).unwrap();
    unit.add_child("ghost").unwrap();

    let err = unit
        .to_markup(&mut ExportContext::new(ChildResolution::Strict))
        .unwrap_err();
    assert!(matches!(err, BlockError::Runtime(_)));

    let node = unit
        .to_markup(&mut ExportContext::new(ChildResolution::Lenient))
        .unwrap();
    assert_eq!(node.children.len(), 1);
    assert_eq!(node.children[0].tag, "html");
}

#[test]
fn unknown_block_type_is_a_resolution_error() {
    let runtime = runtime(ChildPolicy::Inline);
    let err = parse_xml_str(runtime.as_ref(), "<poll/>").unwrap_err();
    assert!(matches!(err, BlockError::Runtime(_)));
}

#[test]
fn unenforced_mismatched_value_survives_export_and_parse() {
    let source = runtime(ChildPolicy::Inline);
    let mut block = source.create_block("html").unwrap();
    block.set("count", "many").unwrap();
    block.save().unwrap();

    let text = export_xml(&mut block, &mut ExportContext::default()).unwrap();
    let target = runtime(ChildPolicy::Inline);
    let copy_id = parse_xml_str(target.as_ref(), &text).unwrap();
    let mut copy = target.get_block(&copy_id).unwrap();
    assert_eq!(copy.get("count").unwrap(), json!("many"));
}

#[test]
fn enforced_field_rejects_mismatched_markup() {
    let runtime = runtime(ChildPolicy::Inline);
    let err = parse_xml_str(runtime.as_ref(), r#"<html score='"many"'/>"#).unwrap_err();
    assert!(matches!(
        err,
        BlockError::Xml(XmlError::Field {
            source: FieldError::Type { .. },
            ..
        })
    ));
}

#[test]
fn padded_and_empty_text_round_trip_unchanged() {
    let source = runtime(ChildPolicy::Inline);
    let mut padded = source.create_block("html").unwrap();
    padded.set("content", "  indented\n").unwrap();
    padded.set("label", " padded ").unwrap();
    padded.save().unwrap();
    let mut empty = source.create_block("html").unwrap();
    empty.set("content", "").unwrap();
    empty.set("label", "").unwrap();
    empty.save().unwrap();

    let target = runtime(ChildPolicy::Inline);
    let padded_text = export_xml(&mut padded, &mut ExportContext::default()).unwrap();
    let mut padded_copy = target
        .get_block(&parse_xml_str(target.as_ref(), &padded_text).unwrap())
        .unwrap();
    assert_eq!(padded_copy.get("content").unwrap(), json!("  indented\n"));
    assert_eq!(padded_copy.get("label").unwrap(), json!(" padded "));

    let empty_text = export_xml(&mut empty, &mut ExportContext::default()).unwrap();
    let mut empty_copy = target
        .get_block(&parse_xml_str(target.as_ref(), &empty_text).unwrap())
        .unwrap();
    assert_eq!(empty_copy.get("content").unwrap(), json!(""));
    assert_eq!(empty_copy.get("label").unwrap(), json!(""));
}

#[test]
fn failed_subtree_leaves_nothing_saved() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let runtime =
        WorkbenchRuntime::builder(store.clone(), registry(ChildPolicy::Inline)).build();

    let err = parse_xml_str(
        runtime.as_ref(),
        r#"<vertical name="Unit">
            <html name="fine">First</html>
            <html weight="heavy"/>
        </vertical>"#,
    )
    .unwrap_err();
    assert!(matches!(err, BlockError::Xml(XmlError::Field { .. })));
    assert!(store.is_empty());

    parse_xml_str(runtime.as_ref(), r#"<vertical><html name="fine"/></vertical>"#).unwrap();
    assert!(!store.is_empty());
}
