//! End-to-end tests for the knowledge engine.
//!
//! These drive the public facade only: create, override, update, resolve,
//! and delete, with a manual clock so timestamp ordering is deterministic.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use knowledge_cascade::clock::ManualClock;
use knowledge_cascade::config::EngineConfig;
use knowledge_cascade::engine::KnowledgeEngine;
use knowledge_cascade::error::KnowledgeError;
use knowledge_cascade::item::NewKnowledge;
use knowledge_cascade::overrides::OverrideRequest;
use knowledge_cascade::scope::{ResolutionContext, ScopeKey};
use knowledge_cascade::store::MemStore;
use knowledge_cascade::value::{AttrValue, Attributes};

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn test_engine() -> (KnowledgeEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(epoch()));
    let engine = KnowledgeEngine::with_parts(
        EngineConfig::in_memory(),
        Arc::new(MemStore::new()),
        clock.clone(),
    )
    .unwrap();
    (engine, clock)
}

fn knowledge(name: &str, scope: ScopeKey, content: &str) -> NewKnowledge {
    NewKnowledge::new(name, scope, content, "text").by("tester")
}

#[test]
fn end_to_end_override_update_delete() {
    let (engine, clock) = test_engine();
    let t1 = ResolutionContext::tenant("T1");

    // 1. System-scoped base item.
    let (i1, created) = engine
        .create_or_return(knowledge("greeting", ScopeKey::System, "Hello"))
        .unwrap();
    assert!(created);

    // 2. Override into the tenant.
    clock.advance(Duration::seconds(1));
    let i2 = engine
        .override_item(OverrideRequest::new(i1.id, ScopeKey::tenant("T1"), "tester"))
        .unwrap();
    assert_ne!(i2.id, i1.id);
    assert_eq!(i2.scope, ScopeKey::tenant("T1"));
    assert_eq!(i2.content, "Hello");
    assert_eq!(i2.content_hash, i1.content_hash);

    // 3. Tenant override shadows the system item.
    assert_eq!(engine.resolve_one("greeting", &t1).unwrap().id, i2.id);

    // 4. Update the tenant chain.
    clock.advance(Duration::seconds(1));
    let i3 = engine
        .update(knowledge("greeting", ScopeKey::tenant("T1"), "Hi"))
        .unwrap();
    assert_ne!(i3.id, i2.id);
    assert_eq!(
        engine.latest("greeting", &ScopeKey::tenant("T1")).unwrap().id,
        i3.id
    );

    // 5. Drop the tenant chain.
    assert_eq!(
        engine
            .delete_all_versions("greeting", &ScopeKey::tenant("T1"))
            .unwrap(),
        2
    );
    assert!(engine
        .all_versions("greeting", &ScopeKey::tenant("T1"))
        .unwrap()
        .is_empty());

    // 6. Resolution falls back to the system item.
    let effective = engine.resolve_one("greeting", &t1).unwrap();
    assert_eq!(effective.id, i1.id);
    assert_eq!(effective.content, "Hello");
}

#[test]
fn idempotent_create_returns_same_id() {
    let (engine, clock) = test_engine();
    let scopes = [
        ScopeKey::System,
        ScopeKey::tenant("T1"),
        ScopeKey::activation("T1", "bot", "prod"),
    ];
    for scope in scopes {
        let (first, created) = engine
            .create_or_return(knowledge("greeting", scope.clone(), "Hello"))
            .unwrap();
        assert!(created);
        clock.advance(Duration::seconds(5));
        let (second, created) = engine
            .create_or_return(knowledge("greeting", scope.clone(), "Hello"))
            .unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(engine.all_versions("greeting", &scope).unwrap().len(), 1);
    }
}

#[test]
fn identical_content_after_other_versions_is_not_duplicated() {
    let (engine, clock) = test_engine();
    let (a, _) = engine
        .create_or_return(knowledge("greeting", ScopeKey::System, "A"))
        .unwrap();
    clock.advance(Duration::seconds(1));
    engine
        .create_or_return(knowledge("greeting", ScopeKey::System, "B"))
        .unwrap();
    clock.advance(Duration::seconds(1));
    let (again, created) = engine
        .create_or_return(knowledge("greeting", ScopeKey::System, "A"))
        .unwrap();
    assert!(!created);
    assert_eq!(again.id, a.id);
    // Returning the older member does not make it the latest.
    assert_eq!(
        engine.latest("greeting", &ScopeKey::System).unwrap().content,
        "B"
    );
}

#[test]
fn latest_has_max_created_at() {
    let (engine, clock) = test_engine();
    let scope = ScopeKey::tenant("T1");
    // Out-of-order timestamps: insertion order is not creation order.
    for (offset, content) in [(10, "ten"), (30, "thirty"), (20, "twenty"), (0, "zero")] {
        clock.set(epoch() + Duration::seconds(offset));
        engine
            .create_or_return(knowledge("greeting", scope.clone(), content))
            .unwrap();
    }

    let versions = engine.all_versions("greeting", &scope).unwrap();
    let max = versions.iter().map(|v| v.created_at).max().unwrap();
    let latest = engine.latest("greeting", &scope).unwrap();
    assert_eq!(latest.created_at, max);
    assert_eq!(latest.content, "thirty");
    assert_eq!(versions[0].id, latest.id);
}

#[test]
fn latest_tie_goes_to_first_inserted() {
    let (engine, _clock) = test_engine();
    let (first, _) = engine
        .create_or_return(knowledge("greeting", ScopeKey::System, "first"))
        .unwrap();
    engine
        .create_or_return(knowledge("greeting", ScopeKey::System, "second"))
        .unwrap();
    assert_eq!(
        engine.latest("greeting", &ScopeKey::System).unwrap().id,
        first.id
    );
}

#[test]
fn override_direction() {
    let (engine, _clock) = test_engine();
    let (system, _) = engine
        .create_or_return(knowledge("greeting", ScopeKey::System, "s"))
        .unwrap();
    let (tenant, _) = engine
        .create_or_return(knowledge("greeting", ScopeKey::tenant("T1"), "t"))
        .unwrap();
    let (activation, _) = engine
        .create_or_return(knowledge(
            "greeting",
            ScopeKey::activation("T1", "bot", "prod"),
            "a",
        ))
        .unwrap();

    let targets = [
        ScopeKey::System,
        ScopeKey::tenant("T1"),
        ScopeKey::activation("T1", "bot", "prod"),
    ];

    // Activation sources can never be overridden.
    for target in &targets {
        let err = engine
            .override_item(OverrideRequest::new(activation.id, target.clone(), "ops"))
            .unwrap_err();
        assert!(matches!(err, KnowledgeError::InvalidScopeTransition { .. }));
    }

    // Tenant sources only move down to an activation.
    for target in &targets[..2] {
        let err = engine
            .override_item(OverrideRequest::new(tenant.id, target.clone(), "ops"))
            .unwrap_err();
        assert!(matches!(err, KnowledgeError::InvalidScopeTransition { .. }));
    }
    let copy = engine
        .override_item(OverrideRequest::new(
            tenant.id,
            ScopeKey::activation("T1", "bot", "staging"),
            "ops",
        ))
        .unwrap();
    assert_eq!(copy.content, "t");

    // System sources move to either narrower level.
    let err = engine
        .override_item(OverrideRequest::new(system.id, ScopeKey::System, "ops"))
        .unwrap_err();
    assert!(matches!(err, KnowledgeError::InvalidScopeTransition { .. }));
    engine
        .override_item(OverrideRequest::new(system.id, ScopeKey::tenant("T2"), "ops"))
        .unwrap();
    engine
        .override_item(OverrideRequest::new(
            system.id,
            ScopeKey::activation("T2", "bot", "prod"),
            "ops",
        ))
        .unwrap();
}

#[test]
fn override_into_another_tenant_is_rejected() {
    let (engine, _clock) = test_engine();
    let (tenant, _) = engine
        .create_or_return(knowledge("greeting", ScopeKey::tenant("T1"), "t"))
        .unwrap();
    let err = engine
        .override_item(OverrideRequest::new(
            tenant.id,
            ScopeKey::activation("T2", "bot", "prod"),
            "ops",
        ))
        .unwrap_err();
    assert!(matches!(err, KnowledgeError::ScopeMismatch { .. }));
}

#[test]
fn override_with_new_content_and_attributes() {
    let (engine, _clock) = test_engine();
    let mut attrs = Attributes::new();
    attrs.insert("tone".into(), AttrValue::from("formal"));
    let (base, _) = engine
        .create_or_return(
            knowledge("greeting", ScopeKey::System, "Hello").with_attributes(attrs.clone()),
        )
        .unwrap();

    let inherited = engine
        .override_item(OverrideRequest::new(base.id, ScopeKey::tenant("T1"), "ops"))
        .unwrap();
    assert_eq!(inherited.attributes, attrs);

    let mut casual = Attributes::new();
    casual.insert("tone".into(), AttrValue::from("casual"));
    let replaced = engine
        .override_item(
            OverrideRequest::new(base.id, ScopeKey::tenant("T2"), "ops")
                .with_content("Hey")
                .with_content_type("markdown")
                .with_attributes(casual.clone()),
        )
        .unwrap();
    assert_eq!(replaced.content, "Hey");
    assert_eq!(replaced.content_type, "markdown");
    assert_eq!(replaced.attributes, casual);
    assert_ne!(replaced.content_hash, base.content_hash);
}

#[test]
fn deletes_are_isolated_per_scope() {
    let (engine, clock) = test_engine();
    let scopes = [
        ScopeKey::System,
        ScopeKey::tenant("T1"),
        ScopeKey::tenant("T2"),
        ScopeKey::activation("T1", "bot", "prod"),
    ];
    for scope in &scopes {
        for content in ["one", "two"] {
            clock.advance(Duration::seconds(1));
            engine
                .create_or_return(knowledge("greeting", scope.clone(), content))
                .unwrap();
        }
    }

    for (i, target) in scopes.iter().enumerate() {
        let before: Vec<_> = scopes[i + 1..]
            .iter()
            .map(|s| engine.all_versions("greeting", s).unwrap())
            .collect();
        engine.delete_all_versions("greeting", target).unwrap();
        let after: Vec<_> = scopes[i + 1..]
            .iter()
            .map(|s| engine.all_versions("greeting", s).unwrap())
            .collect();
        assert_eq!(before, after);
        assert!(engine.all_versions("greeting", target).unwrap().is_empty());
    }
}

#[test]
fn activation_beats_newer_broader_items() {
    let (engine, clock) = test_engine();
    let ctx = ResolutionContext::activation("T1", "bot", "prod");
    let (pinned, _) = engine
        .create_or_return(knowledge(
            "greeting",
            ScopeKey::activation("T1", "bot", "prod"),
            "activation",
        ))
        .unwrap();

    clock.advance(Duration::days(1));
    engine
        .create_or_return(knowledge("greeting", ScopeKey::tenant("T1"), "tenant"))
        .unwrap();
    clock.advance(Duration::days(1));
    engine
        .create_or_return(knowledge("greeting", ScopeKey::System, "system"))
        .unwrap();

    assert_eq!(engine.resolve_one("greeting", &ctx).unwrap().id, pinned.id);
    assert_eq!(
        engine.resolve_all(&ctx).unwrap()["greeting"].id,
        pinned.id
    );
}

#[test]
fn resolve_all_merges_scopes_by_name() {
    let (engine, _clock) = test_engine();
    engine
        .create_or_return(knowledge("greeting", ScopeKey::System, "Hello"))
        .unwrap();
    engine
        .create_or_return(knowledge("farewell", ScopeKey::System, "Bye"))
        .unwrap();
    engine
        .create_or_return(knowledge("greeting", ScopeKey::tenant("T1"), "Hi"))
        .unwrap();
    let pinned = ScopeKey::activation("T1", "bot", "prod");
    engine
        .create_or_return(knowledge("signature", pinned, "-- bot"))
        .unwrap();
    engine
        .create_or_return(knowledge("greeting", ScopeKey::tenant("T2"), "Yo"))
        .unwrap();

    let tenant = engine.resolve_all(&ResolutionContext::tenant("T1")).unwrap();
    assert_eq!(tenant.len(), 2);
    assert_eq!(tenant["greeting"].content, "Hi");
    assert_eq!(tenant["farewell"].content, "Bye");

    let activation = engine
        .resolve_all(&ResolutionContext::activation("T1", "bot", "prod"))
        .unwrap();
    let names: Vec<_> = activation.keys().cloned().collect();
    assert_eq!(names, ["farewell", "greeting", "signature"]);

    let other_activation = engine
        .resolve_all(&ResolutionContext::activation("T1", "bot", "staging"))
        .unwrap();
    assert!(!other_activation.contains_key("signature"));
}

#[test]
fn layers_show_what_an_override_shadows() {
    let (engine, _clock) = test_engine();
    let (base, _) = engine
        .create_or_return(knowledge("greeting", ScopeKey::System, "Hello"))
        .unwrap();
    let tenant = engine
        .override_item(
            OverrideRequest::new(base.id, ScopeKey::tenant("T1"), "ops").with_content("Hi"),
        )
        .unwrap();

    let ctx = ResolutionContext::activation("T1", "bot", "prod");
    let layers = engine.layers("greeting", &ctx).unwrap();
    let ids: Vec<_> = layers.iter().map(|i| i.id).collect();
    assert_eq!(ids, [tenant.id, base.id]);
    assert_eq!(layers[0].id, engine.resolve_one("greeting", &ctx).unwrap().id);
}

#[test]
fn unknown_names_and_ids_are_not_found() {
    let (engine, _clock) = test_engine();
    let ctx = ResolutionContext::tenant("T1");
    assert!(matches!(
        engine.resolve_one("missing", &ctx),
        Err(KnowledgeError::NotFound { .. })
    ));
    assert!(matches!(
        engine.latest("missing", &ScopeKey::System),
        Err(KnowledgeError::NotFound { .. })
    ));
    assert!(engine.resolve_all(&ctx).unwrap().is_empty());
    assert!(engine.all_versions("missing", &ScopeKey::System).unwrap().is_empty());
}

#[test]
fn list_scope_returns_latest_per_name() {
    let (engine, clock) = test_engine();
    let scope = ScopeKey::tenant("T1");
    for (name, content) in [("b", "1"), ("a", "1"), ("b", "2")] {
        clock.advance(Duration::seconds(1));
        engine
            .create_or_return(knowledge(name, scope.clone(), content))
            .unwrap();
    }
    let listed = engine.list_scope(&scope).unwrap();
    let summary: Vec<_> = listed
        .iter()
        .map(|i| (i.name.as_str(), i.content.as_str()))
        .collect();
    assert_eq!(summary, [("a", "1"), ("b", "2")]);
}

#[test]
fn delete_one_version_keeps_the_rest() {
    let (engine, clock) = test_engine();
    let (old, _) = engine
        .create_or_return(knowledge("greeting", ScopeKey::System, "old"))
        .unwrap();
    clock.advance(Duration::seconds(1));
    let (new, _) = engine
        .create_or_return(knowledge("greeting", ScopeKey::System, "new"))
        .unwrap();

    assert!(engine.delete_one(&new.id).unwrap());
    assert!(!engine.delete_one(&new.id).unwrap());
    assert_eq!(engine.latest("greeting", &ScopeKey::System).unwrap().id, old.id);
    assert!(matches!(
        engine.get(&new.id),
        Err(KnowledgeError::NotFound { .. })
    ));
}

#[test]
fn invalid_input_is_rejected() {
    let (engine, _clock) = test_engine();
    assert!(matches!(
        engine.create_or_return(knowledge("", ScopeKey::System, "x")),
        Err(KnowledgeError::Validation { .. })
    ));
    assert!(matches!(
        engine.create_or_return(knowledge("greeting", ScopeKey::tenant(""), "x")),
        Err(KnowledgeError::Validation { .. })
    ));
    assert!(matches!(
        engine.resolve_all(&ResolutionContext {
            tenant: "T1".into(),
            agent: Some("bot".into()),
            activation: None,
        }),
        Err(KnowledgeError::Validation { .. })
    ));
}
