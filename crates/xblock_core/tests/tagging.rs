use serde_json::json;
use xblock_core::{load_tagged_classes, BlockClass, ClassRegistry};

fn registry() -> ClassRegistry {
    let media = BlockClass::builder("media").tag("video").build();
    let player = BlockClass::builder("player")
        .extends(&media)
        .tag("interactive")
        .handler("play", |_, _| Ok(json!("playing")))
        .build();
    let clip = BlockClass::builder("clip").tag("video, short").build();
    let html = BlockClass::builder("html").tag("text").build();

    let mut registry = ClassRegistry::new();
    for class in [media, player, clip, html] {
        registry.register(class).unwrap();
    }
    registry
}

#[test]
fn tagged_classes_include_inherited_tags() {
    let registry = registry();
    let names: Vec<String> = load_tagged_classes(&registry, "video")
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["clip", "media", "player"]);
}

#[test]
fn tag_sets_are_frozen_per_class() {
    let registry = registry();
    let player = registry.load_class("player").unwrap();
    let media = registry.load_class("media").unwrap();

    assert!(player.has_tag("video"));
    assert!(player.has_tag("interactive"));
    assert!(!media.has_tag("interactive"));
    assert!(player.handler("play").is_some());
}

#[test]
fn unmatched_tag_yields_nothing() {
    let registry = registry();
    assert_eq!(load_tagged_classes(&registry, "audio").count(), 0);

    let text: Vec<String> = load_tagged_classes(&registry, "text")
        .map(|(name, class)| {
            assert_eq!(class.name(), name);
            name
        })
        .collect();
    assert_eq!(text, vec!["html"]);
}
