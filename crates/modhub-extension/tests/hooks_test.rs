//! Integration tests for the hook index and dispatcher.

mod helpers;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use modhub_cache::keys;
use modhub_core::config::registry::RegistryConfig;
use modhub_core::traits::cache::CacheProvider;
use modhub_extension::diagnostics::ExtensionDiagnostic;
use modhub_extension::hooks::ImplementationEntry;
use modhub_extension::prelude::*;

use helpers::{TestSite, module, names, theme};

/// Alter handler appending `<extension>:<hook>` to the request data.
fn trace(
    extension: &'static str,
    hook: &'static str,
) -> impl Fn(&mut AlterRequest) -> AppResult<()> + Send + Sync + 'static {
    move |request| {
        if let Some(calls) = request.data.as_array_mut() {
            calls.push(json!(format!("{extension}:{hook}")));
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_implementors_follow_module_order() {
    let site = TestSite::new(vec![
        module("zeta").with_weight(-1),
        module("alpha"),
        module("mid"),
    ]);
    for name in ["zeta", "alpha", "mid"] {
        site.register(
            ExtensionHooks::new(name)
                .on("cron", |_| Ok(None))
                .on("menu", |_| Ok(None)),
        )
        .await;
    }
    let index = site.manager.index();

    // Lookup order does not influence the result.
    let menu = index.implementors_of("menu").await.unwrap();
    let cron = index.implementors_of("cron").await.unwrap();
    assert_eq!(menu, names(&["zeta", "alpha", "mid"]));
    assert_eq!(cron, menu);
    assert!(index.implementors_of("nothing").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invoke_all_merges_keyed_results() {
    let site = TestSite::new(vec![module("a"), module("b"), module("c")]);
    site.register(ExtensionHooks::new("a").on("foo", |_| Ok(Some(json!({"k": ["v1"]})))))
        .await;
    site.register(ExtensionHooks::new("b").on("foo", |_| Ok(Some(json!({"k": ["v2"]})))))
        .await;
    site.register(ExtensionHooks::new("c").on("bar", |_| Ok(Some(json!("unused")))))
        .await;

    let merged = site.manager.invoke_all("foo", &[]).await.unwrap();
    assert_eq!(merged.into_value(), json!({"k": ["v1", "v2"]}));
}

#[tokio::test]
async fn test_invoke_all_passes_args_and_skips_failures() {
    let site = TestSite::new(vec![module("a"), module("b"), module("c")]);
    site.register(ExtensionHooks::new("a").on("search", |args| {
        Ok(Some(json!([format!("a:{}", args[0].as_str().unwrap_or_default())])))
    }))
    .await;
    site.register(ExtensionHooks::new("b").on("search", |_| {
        Err(AppError::extension("index offline"))
    }))
    .await;
    site.register(ExtensionHooks::new("c").on("search", |args| {
        Ok(Some(json!(format!("c:{}", args[0].as_str().unwrap_or_default()))))
    }))
    .await;

    let merged = site
        .manager
        .invoke_all("search", &[json!("rust")])
        .await
        .unwrap();
    assert_eq!(merged.positional, vec![json!("a:rust"), json!("c:rust")]);
}

#[tokio::test]
async fn test_single_invoke_and_implements() {
    let site = TestSite::new(vec![module("node")]);
    site.register(ExtensionHooks::new("node").on("help", |_| Ok(Some(json!("node help")))))
        .await;
    let dispatcher = site.manager.dispatcher();

    assert!(dispatcher.implements("node", "help").await.unwrap());
    assert!(!dispatcher.implements("node", "menu").await.unwrap());
    assert_eq!(
        dispatcher.invoke("node", "help", &[]).await.unwrap(),
        Some(json!("node help"))
    );
    assert_eq!(dispatcher.invoke("node", "menu", &[]).await.unwrap(), None);
    assert_eq!(dispatcher.invoke("ghost", "help", &[]).await.unwrap(), None);
}

fn form_site(active_theme: Option<&str>) -> TestSite {
    let config = RegistryConfig {
        default_theme: active_theme.map(str::to_string),
        ..RegistryConfig::default()
    };
    TestSite::with_config(
        vec![
            module("alpha"),
            module("beta"),
            module("gamma"),
            theme("classy"),
            theme("bartik").with_base_theme("classy"),
        ],
        config,
    )
}

async fn register_form_hooks(site: &TestSite) {
    site.register(ExtensionHooks::new("alpha").on_alter("form_alter", trace("alpha", "form_alter")))
        .await;
    site.register(
        ExtensionHooks::new("beta")
            .on_alter("form_myform_alter", trace("beta", "form_myform_alter")),
    )
    .await;
    site.register(
        ExtensionHooks::new("gamma")
            .on_alter("form_alter", trace("gamma", "form_alter"))
            .on_alter("form_myform_alter", trace("gamma", "form_myform_alter")),
    )
    .await;
    site.register(ExtensionHooks::new("classy").on_alter("form_alter", trace("classy", "form_alter")))
        .await;
    site.register(
        ExtensionHooks::new("bartik")
            .on_alter("form_myform_alter", trace("bartik", "form_myform_alter")),
    )
    .await;
}

#[tokio::test]
async fn test_multi_type_alter_order_with_theme_last() {
    let site = form_site(Some("bartik"));
    register_form_hooks(&site).await;

    let mut request = AlterRequest::new(json!([]));
    site.manager
        .alter(["form", "form_myform"], &mut request)
        .await
        .unwrap();

    assert_eq!(
        request.data,
        json!([
            "alpha:form_alter",
            "beta:form_myform_alter",
            "gamma:form_alter",
            "gamma:form_myform_alter",
            "classy:form_alter",
            "bartik:form_myform_alter",
        ])
    );
}

#[tokio::test]
async fn test_single_type_alter_and_theme_switch() {
    let site = form_site(Some("bartik"));
    register_form_hooks(&site).await;

    let mut request = AlterRequest::new(json!([]));
    site.manager.alter("form", &mut request).await.unwrap();
    assert_eq!(
        request.data,
        json!(["alpha:form_alter", "gamma:form_alter", "classy:form_alter"])
    );

    site.manager.set_active_theme(None).await;
    let mut request = AlterRequest::new(json!([]));
    site.manager.alter("form", &mut request).await.unwrap();
    assert_eq!(request.data, json!(["alpha:form_alter", "gamma:form_alter"]));
}

#[tokio::test]
async fn test_alter_contexts_are_mutable() {
    let site = TestSite::new(vec![module("a"), module("b")]);
    site.register(ExtensionHooks::new("a").on_alter("page_alter", |request| {
        request.context1 = json!({"seen_by": ["a"]});
        Ok(())
    }))
    .await;
    site.register(ExtensionHooks::new("b").on_alter("page_alter", |request| {
        if let Some(seen) = request.context1["seen_by"].as_array_mut() {
            seen.push(json!("b"));
        }
        request.context2 = json!(2);
        Ok(())
    }))
    .await;

    let mut request = AlterRequest::new(Value::Null);
    site.manager.alter("page", &mut request).await.unwrap();
    assert_eq!(request.context1, json!({"seen_by": ["a", "b"]}));
    assert_eq!(request.context2, json!(2));
}

#[tokio::test]
async fn test_vanished_implementation_is_pruned() {
    let site = TestSite::new(vec![module("a"), module("b")]);
    site.register(ExtensionHooks::new("a").on("cron", |_| Ok(None)))
        .await;
    site.register(ExtensionHooks::new("b").on("cron", |_| Ok(None)))
        .await;
    let index = site.manager.index();

    assert_eq!(index.implementors_of("cron").await.unwrap(), names(&["a", "b"]));
    site.manager.unregister("b").await.unwrap();
    assert_eq!(index.implementors_of("cron").await.unwrap(), names(&["a"]));

    assert!(site.manager.diagnostics().await.contains(
        &ExtensionDiagnostic::StaleImplementation {
            hook: "cron".into(),
            extension: "b".into(),
        }
    ));
}

#[tokio::test]
async fn test_grouped_implementation_is_loaded_on_scan() {
    let site = TestSite::new(vec![module("token"), module("views")]);
    site.register(
        ExtensionHooks::new("token")
            .declare("token_info", HookInfo::grouped("tokens"))
            .on_in_group("tokens", "token_info", |_| Ok(Some(json!({"site": {}})))),
    )
    .await;
    site.register(
        ExtensionHooks::new("views")
            .on_in_group("tokens", "token_info", |_| Ok(Some(json!({"view": {}})))),
    )
    .await;

    let entries = site.manager.index().entries_of("token_info").await.unwrap();
    assert_eq!(
        entries,
        vec![
            ImplementationEntry {
                extension: "token".into(),
                group: Some("tokens".into()),
            },
            ImplementationEntry {
                extension: "views".into(),
                group: Some("tokens".into()),
            },
        ]
    );

    let merged = site.manager.invoke_all("token_info", &[]).await.unwrap();
    assert_eq!(merged.into_value(), json!({"site": {}, "view": {}}));
}

/// Provider whose only hook lives in the `reports` group; counts loads.
#[derive(Debug, Default)]
struct CountingGroups {
    loads: AtomicUsize,
}

#[async_trait]
impl HookProvider for CountingGroups {
    fn extension(&self) -> &str {
        "stats"
    }

    fn implements(&self, hook: &str) -> bool {
        hook == "report" && self.loads.load(Ordering::SeqCst) > 0
    }

    async fn invoke(&self, _hook: &str, _args: &[Value]) -> AppResult<Option<Value>> {
        Ok(Some(json!({"visits": 1})))
    }

    async fn alter(&self, _hook: &str, _request: &mut AlterRequest) -> AppResult<()> {
        Ok(())
    }

    fn hook_info(&self) -> BTreeMap<String, HookInfo> {
        BTreeMap::from([("report".to_string(), HookInfo::grouped("reports"))])
    }

    fn load_group(&self, _group: &str) {
        self.loads.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_invalidate_forgets_loaded_groups() {
    let site = TestSite::new(vec![module("stats")]);
    let provider = std::sync::Arc::new(CountingGroups::default());
    site.manager.register(provider.clone()).await.unwrap();

    let merged = site.manager.invoke_all("report", &[]).await.unwrap();
    assert_eq!(merged.get("visits"), Some(&json!(1)));
    site.manager.invoke_all("report", &[]).await.unwrap();
    assert_eq!(provider.loads.load(Ordering::SeqCst), 1);

    site.manager.invalidate().await.unwrap();
    site.manager.invoke_all("report", &[]).await.unwrap();
    assert_eq!(provider.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_hook_info_alter_can_assign_groups() {
    let site = TestSite::new(vec![module("views"), module("tweaks")]);
    site.register(
        ExtensionHooks::new("views")
            .on_in_group("views", "views_data", |_| Ok(Some(json!({"node": {}})))),
    )
    .await;
    site.register(ExtensionHooks::new("tweaks").on_alter("hook_info_alter", |request| {
        request.data["views_data"] = json!({"group": "views"});
        Ok(())
    }))
    .await;

    let info = site.manager.index().hook_info().await.unwrap();
    assert_eq!(info.get("views_data"), Some(&HookInfo::grouped("views")));
    assert_eq!(
        site.manager.index().implementors_of("views_data").await.unwrap(),
        names(&["views"])
    );
}

#[tokio::test]
async fn test_registrants_reorder_implementations() {
    let site = TestSite::new(vec![module("alpha"), module("beta"), module("zmod")]);
    site.register(ExtensionHooks::new("alpha").on("foo", |_| Ok(None)))
        .await;
    site.register(ExtensionHooks::new("beta").on("foo", |_| Ok(None)))
        .await;
    site.register(
        ExtensionHooks::new("zmod").on_alter("module_implements_alter", |request| {
            if request.context1 == json!("foo") {
                if let Some(items) = request.data.as_array_mut() {
                    if let Some(pos) = items.iter().position(|e| e["extension"] == "alpha") {
                        let item = items.remove(pos);
                        items.push(item);
                    }
                }
            }
            Ok(())
        }),
    )
    .await;
    let index = site.manager.index();

    assert_eq!(index.implementors_of("foo").await.unwrap(), names(&["beta", "alpha"]));
    assert_eq!(
        index.implementors_of("module_implements_alter").await.unwrap(),
        names(&["zmod"])
    );
}

#[tokio::test]
async fn test_index_written_only_for_cacheable_methods() {
    let site = TestSite::new(vec![module("a")]);
    site.register(ExtensionHooks::new("a").on("foo", |_| Ok(None)))
        .await;
    site.manager.index().implementors_of("foo").await.unwrap();

    assert!(!site.manager.end_request("POST").await.unwrap());
    assert_eq!(
        site.tiers.default.get(&keys::module_implements()).await.unwrap(),
        None
    );

    assert!(site.manager.end_request("get").await.unwrap());
    assert!(site
        .tiers
        .default
        .get(&keys::module_implements())
        .await
        .unwrap()
        .is_some());

    // Nothing changed since the last write.
    assert!(!site.manager.end_request("GET").await.unwrap());
}

#[tokio::test]
async fn test_persisted_index_is_reused_by_another_process() {
    let site = TestSite::new(vec![module("a"), module("b")]);
    site.register(ExtensionHooks::new("a").on("foo", |_| Ok(None)))
        .await;
    site.manager.index().implementors_of("foo").await.unwrap();
    assert!(site.manager.end_request("GET").await.unwrap());

    let other = site.another_process();
    other
        .register(ExtensionHooks::new("a").on("foo", |_| Ok(None)).into_provider())
        .await
        .unwrap();
    other
        .register(ExtensionHooks::new("b").on("foo", |_| Ok(None)).into_provider())
        .await
        .unwrap();

    // The persisted entry wins until the index is invalidated.
    assert_eq!(other.index().implementors_of("foo").await.unwrap(), names(&["a"]));

    other.invalidate().await.unwrap();
    assert_eq!(
        other.index().implementors_of("foo").await.unwrap(),
        names(&["a", "b"])
    );
}
