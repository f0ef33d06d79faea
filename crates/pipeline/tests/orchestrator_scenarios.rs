mod common;

use std::time::Duration;

use common::Harness;
use roomcraft_core::project::{Budget, ProjectStatus};
use roomcraft_events::event_types;
use roomcraft_pipeline::testing::{
    fake_jpeg, result, CallKind, Reply, ScriptedModel, ScriptedSearch, StaticFetcher,
};
use roomcraft_pipeline::RunOutcome;
use tokio_util::sync::CancellationToken;

fn catalogue() -> ScriptedSearch {
    ScriptedSearch::new().with_fallback(vec![result(
        "Tabouret Hinoki - Boutique",
        "https://shop.example/tabouret",
        "https://cdn.example/tabouret.jpg",
    )])
}

fn catalogue_images() -> StaticFetcher {
    StaticFetcher::new().with_image("https://cdn.example/tabouret.jpg", fake_jpeg())
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn kitchen_japandi_run_completes() {
    let h = Harness::new(ScriptedModel::happy_path(10), catalogue(), catalogue_images());
    let id = h.create_project("kitchen", "japandi", Budget::Amount(2000.0)).await;

    let outcome = h.orchestrator.run(id, CancellationToken::new()).await.unwrap();

    let RunOutcome::Completed { generation_id } = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    let project = h.project(id).await;
    assert_eq!(project.status, ProjectStatus::Completed);
    assert!(project.completed_at.is_some());
    assert!(project.error.is_none());

    let plan = project.plan.as_ref().unwrap();
    assert!((8..=12).contains(&plan.len()));

    let products = project.products.as_ref().unwrap();
    assert!(!products.is_empty() && products.len() <= 6);
    assert!(products.iter().all(|p| !p.image_url.is_empty()));

    assert_eq!(project.generations.len(), 1);
    let generation = &project.generations[0];
    assert_eq!(generation.id, generation_id);
    assert!(generation
        .image_url
        .starts_with(&format!("memory://blobs/generations/{id}/")));
    assert_eq!(h.blobs.content_type(&format!("generations/{id}/{generation_id}.png")).await.as_deref(), Some("image/png"));

    // Room photo plus one persisted product image (every product shares it).
    let render = h
        .model
        .calls()
        .into_iter()
        .find(|c| c.kind == CallKind::Render)
        .unwrap();
    assert_eq!(render.image_count, 1 + products.len().min(5));
    assert!(render.instruction.contains("Transform this kitchen into japandi design"));

    // Budget context reached the category prompt.
    let categories = h
        .model
        .calls()
        .into_iter()
        .find(|c| c.kind == CallKind::Categories)
        .unwrap();
    assert!(categories.instruction.contains("around 2000€"));
}

#[tokio::test]
async fn lifecycle_events_are_published_in_order() {
    let h = Harness::new(ScriptedModel::happy_path(8), catalogue(), catalogue_images());
    let id = h.create_project("bedroom", "boho", Budget::Unlimited).await;
    let mut rx = h.events.subscribe();

    h.orchestrator.run(id, CancellationToken::new()).await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert!(event.concerns(id));
        seen.push(event.event_type);
    }
    assert_eq!(
        seen,
        [
            event_types::PROJECT_GENERATING,
            event_types::PROJECT_PLAN_READY,
            event_types::PROJECT_PRODUCTS_READY,
            event_types::PROJECT_COMPLETED,
        ]
    );
}

// ---------------------------------------------------------------------------
// Degraded stages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_search_still_renders_and_completes() {
    let h = Harness::new(ScriptedModel::happy_path(8), ScriptedSearch::new(), StaticFetcher::new());
    let id = h.create_project("living room", "mid-century", Budget::Unlimited).await;

    let outcome = h.orchestrator.run(id, CancellationToken::new()).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Completed { .. }));
    let project = h.project(id).await;
    assert_eq!(project.products, Some(Vec::new()));
    assert_eq!(project.generations.len(), 1);
    // Six candidates, three query variations each.
    assert_eq!(h.search.queries().len(), 18);
}

#[tokio::test]
async fn unreadable_plan_continues_in_category_mode() {
    let model = ScriptedModel::happy_path(8)
        .on(CallKind::Plan, Reply::Text("Lovely room! I'd add plants.".into()));
    let h = Harness::new(model, catalogue(), catalogue_images());
    let id = h.create_project("office", "industrial", Budget::Unlimited).await;

    let outcome = h.orchestrator.run(id, CancellationToken::new()).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Completed { .. }));
    let project = h.project(id).await;
    assert_eq!(project.plan, Some(Vec::new()));
    let categories = h
        .model
        .calls()
        .into_iter()
        .find(|c| c.kind == CallKind::Categories)
        .unwrap();
    assert!(categories.instruction.contains("Focus on: desk, office chair"));
}

#[tokio::test]
async fn blocklisted_images_never_become_products() {
    let search = ScriptedSearch::new().with_fallback(vec![
        result("Brand", "https://shop.example/", "https://shop.example/static/logo.png"),
        result("Brand", "https://shop.example/a", "https://shop.example/img/sofa.svg"),
        result("Brand", "https://shop.example/b", "https://shop.example/assets/placeholder.jpg"),
    ]);
    let h = Harness::new(ScriptedModel::happy_path(8), search, StaticFetcher::new());
    let id = h.create_project("kitchen", "japandi", Budget::Unlimited).await;

    h.orchestrator.run(id, CancellationToken::new()).await.unwrap();

    assert_eq!(h.project(id).await.products, Some(Vec::new()));
}

#[tokio::test]
async fn products_are_ordered_by_priority() {
    let model = ScriptedModel::happy_path(8).on(
        CallKind::Categories,
        Reply::Text(
            r#"[{"category": "Rug", "searchTerm": "tapis", "priority": 3},
                {"category": "Table", "searchTerm": "table", "priority": 1},
                {"category": "Plant", "searchTerm": "plante"},
                {"category": "Lamp", "searchTerm": "lampe", "priority": 2}]"#
                .into(),
        ),
    );
    let h = Harness::new(model, catalogue(), catalogue_images());
    let id = h.create_project("dining room", "rustic", Budget::Unlimited).await;

    h.orchestrator.run(id, CancellationToken::new()).await.unwrap();

    let categories: Vec<String> = h
        .project(id)
        .await
        .products
        .unwrap()
        .into_iter()
        .map(|p| p.category)
        .collect();
    assert_eq!(categories, ["Table", "Lamp", "Rug", "Plant"]);
}

// ---------------------------------------------------------------------------
// Render failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn blocked_render_fails_the_run() {
    let model = ScriptedModel::happy_path(8).on(CallKind::Render, Reply::Blocked);
    let h = Harness::new(model, catalogue(), catalogue_images());
    let id = h.create_project("bathroom", "spa", Budget::Unlimited).await;
    let mut rx = h.events.subscribe();

    let outcome = h.orchestrator.run(id, CancellationToken::new()).await.unwrap();

    assert!(matches!(
        outcome,
        RunOutcome::Failed { code: "CONTENT_POLICY_BLOCKED", .. }
    ));
    let project = h.project(id).await;
    assert_eq!(project.status, ProjectStatus::Error);
    assert!(project.products.is_some_and(|p| !p.is_empty()));
    assert!(project.generations.is_empty());

    let mut last = None;
    while let Ok(event) = rx.try_recv() {
        last = Some(event);
    }
    let last = last.unwrap();
    assert_eq!(last.event_type, event_types::PROJECT_FAILED);
    assert_eq!(last.payload["code"], "CONTENT_POLICY_BLOCKED");
}

#[tokio::test]
async fn imageless_render_reports_model_text() {
    let model = ScriptedModel::happy_path(8).on(
        CallKind::Render,
        Reply::NoImage("I can only describe this room.".into()),
    );
    let h = Harness::new(model, catalogue(), catalogue_images());
    let id = h.create_project("kitchen", "japandi", Budget::Unlimited).await;

    let outcome = h.orchestrator.run(id, CancellationToken::new()).await.unwrap();

    let RunOutcome::Failed { code, message } = outcome else {
        panic!("expected failure");
    };
    assert_eq!(code, "NO_IMAGE_PRODUCED");
    assert!(message.contains("I can only describe this room."));
    assert_eq!(h.project(id).await.error.as_deref(), Some(message.as_str()));
}

#[tokio::test]
async fn render_timeout_is_distinct_from_missing_image() {
    let model = ScriptedModel::happy_path(8).on(CallKind::Render, Reply::Timeout);
    let h = Harness::new(model, catalogue(), catalogue_images());
    let id = h.create_project("kitchen", "japandi", Budget::Unlimited).await;

    let outcome = h.orchestrator.run(id, CancellationToken::new()).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Failed { code: "UPSTREAM_TIMEOUT", .. }));
}

// ---------------------------------------------------------------------------
// At most one run, cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_triggers_run_once() {
    let model = ScriptedModel::happy_path(8).with_delay(CallKind::Plan, Duration::from_millis(50));
    let h = Harness::new(model, catalogue(), catalogue_images());
    let id = h.create_project("kitchen", "japandi", Budget::Unlimited).await;

    let a = h.orchestrator.clone();
    let b = h.orchestrator.clone();
    let (first, second) = tokio::join!(
        tokio::spawn(async move { a.run(id, CancellationToken::new()).await }),
        tokio::spawn(async move { b.run(id, CancellationToken::new()).await }),
    );
    let outcomes = [first.unwrap().unwrap(), second.unwrap().unwrap()];

    assert_eq!(outcomes.iter().filter(|o| **o == RunOutcome::Skipped).count(), 1);
    assert_eq!(h.model.call_count(CallKind::Plan), 1);
    assert_eq!(h.model.call_count(CallKind::Render), 1);
    assert_eq!(h.project(id).await.generations.len(), 1);
}

#[tokio::test]
async fn cancelled_run_ends_in_error() {
    let model = ScriptedModel::happy_path(8).with_delay(CallKind::Render, Duration::from_secs(30));
    let h = Harness::new(model, catalogue(), catalogue_images());
    let id = h.create_project("kitchen", "japandi", Budget::Unlimited).await;

    let cancel = CancellationToken::new();
    let orchestrator = h.orchestrator.clone();
    let token = cancel.clone();
    let run = tokio::spawn(async move { orchestrator.run(id, token).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run stops promptly")
        .unwrap()
        .unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Failed {
            code: "CANCELLED",
            message: "cancelled".into()
        }
    );
    let project = h.project(id).await;
    assert_eq!(project.status, ProjectStatus::Error);
    assert_eq!(project.error.as_deref(), Some("cancelled"));
    assert!(project.plan.is_some());
}

#[tokio::test]
async fn non_pending_projects_are_not_rerun() {
    let h = Harness::new(ScriptedModel::happy_path(8), catalogue(), catalogue_images());
    let id = h.create_project("kitchen", "japandi", Budget::Unlimited).await;
    h.orchestrator.run(id, CancellationToken::new()).await.unwrap();

    let again = h.orchestrator.run(id, CancellationToken::new()).await.unwrap();

    assert_eq!(again, RunOutcome::Skipped);
    assert_eq!(h.model.call_count(CallKind::Render), 1);
}
