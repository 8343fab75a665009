//! Integration tests for Corral

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// A config file and state directory private to one test
    struct Workspace {
        dir: TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let config = format!(
                "[store]\nstate_dir = {:?}\n",
                dir.path().join("state").display().to_string()
            );
            std::fs::write(dir.path().join("config.toml"), config).unwrap();
            Self { dir }
        }

        fn config_path(&self) -> PathBuf {
            self.dir.path().join("config.toml")
        }

        fn corral(&self) -> Command {
            let mut cmd = corral();
            cmd.arg("--config").arg(self.config_path());
            cmd
        }

        fn run(&self, args: &[&str]) {
            self.corral().args(args).assert().success();
        }

        fn json(&self, args: &[&str]) -> serde_json::Value {
            let output = self.corral().args(args).args(["-f", "json"]).output().unwrap();
            assert!(
                output.status.success(),
                "{}",
                String::from_utf8_lossy(&output.stderr)
            );
            serde_json::from_slice(&output.stdout).unwrap()
        }
    }

    fn corral() -> Command {
        let mut cmd = cargo_bin_cmd!("corral");
        cmd.env_remove("CORRAL_CONFIG").env_remove("CORRAL_NAMESPACE");
        cmd
    }

    #[test]
    fn help_displays() {
        corral()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Control plane for deploying applications"));
    }

    #[test]
    fn version_displays() {
        corral()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("corral"));
    }

    #[test]
    fn config_path_and_show() {
        let ws = Workspace::new();
        ws.corral()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
        ws.corral()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"));
    }

    #[test]
    fn config_set_persists() {
        let ws = Workspace::new();
        ws.run(&["config", "set", "cache.stale_days", "7"]);
        ws.corral()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("stale_days = 7"));
    }

    #[test]
    fn config_set_unknown_key_fails() {
        let ws = Workspace::new();
        ws.corral()
            .args(["config", "set", "vm.name", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn app_list_empty() {
        let ws = Workspace::new();
        ws.corral()
            .args(["app", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No applications"));
    }

    #[test]
    fn app_create_and_list() {
        let ws = Workspace::new();
        ws.run(&["app", "create", "web"]);
        ws.corral()
            .args(["app", "list", "-f", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("web"));
    }

    #[test]
    fn app_create_rejects_invalid_name() {
        let ws = Workspace::new();
        ws.corral()
            .args(["app", "create", "Web_App"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid application name"));
    }

    #[test]
    fn app_show_missing() {
        let ws = Workspace::new();
        ws.corral()
            .args(["app", "show", "ghost"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("application not found: ghost"));
    }

    #[test]
    fn batch_bind_redeploys_once() {
        let ws = Workspace::new();
        ws.run(&["app", "create", "web"]);
        ws.run(&["service", "create", "db", "--value", "user=admin"]);
        ws.run(&["service", "create", "mq"]);

        ws.corral()
            .args(["service", "bind", "web", "db", "mq"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Bound db, mq to workspace/web"));

        let details = ws.json(&["app", "show", "web"]);
        assert_eq!(details["application"]["status"]["restart_generation"], 1);
        let bound = details["application"]["spec"]["bound_configurations"]
            .as_array()
            .unwrap();
        assert_eq!(bound.len(), 2);
        assert_eq!(bound[0]["name"], "xs-db-creds");
        assert_eq!(bound[1]["service"], "mq");
    }

    #[test]
    fn batch_bind_missing_service_binds_nothing() {
        let ws = Workspace::new();
        ws.run(&["app", "create", "web"]);
        ws.run(&["service", "create", "s1"]);
        ws.run(&["service", "create", "s3"]);

        ws.corral()
            .args(["service", "bind", "web", "s1", "s2", "s3"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("service not found: s2"));

        let details = ws.json(&["app", "show", "web"]);
        assert_eq!(details["application"]["status"]["restart_generation"], 0);
        assert!(details["application"]["spec"]["bound_configurations"]
            .as_array()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn legacy_bind_order_is_accepted() {
        let ws = Workspace::new();
        ws.run(&["app", "create", "web"]);
        ws.run(&["service", "create", "db"]);

        ws.corral()
            .args(["service", "bind", "db", "web"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Bound db to workspace/web"));
    }

    #[test]
    fn bind_without_restart() {
        let ws = Workspace::new();
        ws.run(&["app", "create", "web"]);
        ws.run(&["service", "create", "db"]);
        ws.corral()
            .args(["service", "bind", "web", "db", "--no-restart"])
            .assert()
            .success()
            .stdout(predicate::str::contains("not redeployed"));

        let details = ws.json(&["app", "show", "web"]);
        assert_eq!(details["application"]["status"]["restart_generation"], 0);
    }

    #[test]
    fn delete_bound_service_needs_unbind() {
        let ws = Workspace::new();
        ws.run(&["app", "create", "web"]);
        ws.run(&["service", "create", "db"]);
        ws.run(&["service", "bind", "web", "db"]);

        ws.corral()
            .args(["service", "delete", "db"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("still bound to: web"))
            .stderr(predicate::str::contains("Hint:"));

        ws.run(&["service", "delete", "db", "--unbind"]);

        let details = ws.json(&["app", "show", "web"]);
        assert!(details["application"]["spec"]["bound_configurations"]
            .as_array()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn service_update_redeploys_bound_apps() {
        let ws = Workspace::new();
        ws.run(&["app", "create", "web"]);
        ws.run(&["service", "create", "db", "--value", "user=admin"]);
        ws.run(&["service", "bind", "web", "db"]);

        ws.corral()
            .args(["service", "update", "db", "--set", "user=root"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Redeployed: web"));

        let details = ws.json(&["app", "show", "web"]);
        assert_eq!(details["application"]["status"]["restart_generation"], 2);

        let service = ws.json(&["service", "show", "db"]);
        assert_eq!(service["service"]["spec"]["values"]["user"], "root");
    }

    #[test]
    fn stage_creates_then_keeps_cache() {
        let ws = Workspace::new();
        ws.run(&["app", "create", "web", "--cache-size", "2Gi"]);

        ws.corral()
            .args(["app", "stage", "web"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created cache volume"));
        ws.corral()
            .args(["app", "stage", "web"])
            .assert()
            .success()
            .stdout(predicate::str::contains("up to date"));

        ws.corral()
            .args(["cache", "list", "-f", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cache-workspace-web"));
    }

    #[test]
    fn cleanup_rejects_invalid_stale_days() {
        let ws = Workspace::new();
        ws.corral()
            .args(["cache", "cleanup", "--stale-days", "abc"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid staleDays"));
    }

    #[test]
    fn cleanup_removes_orphaned_cache() {
        let ws = Workspace::new();
        ws.run(&["app", "create", "web"]);
        ws.run(&["app", "create", "api"]);
        ws.run(&["app", "stage", "web"]);
        ws.run(&["app", "stage", "api"]);
        ws.run(&["app", "delete", "web"]);

        let dry = ws.json(&["cache", "cleanup", "--stale-days", "0", "--dry-run"]);
        assert_eq!(dry["dryRun"], true);
        assert_eq!(dry["staleCaches"].as_array().unwrap().len(), 1);
        assert!(dry["deleted"].as_array().unwrap().is_empty());

        let report = ws.json(&["cache", "cleanup", "--stale-days", "0"]);
        assert_eq!(report["deleted"], serde_json::json!(["cache-workspace-web"]));

        ws.corral()
            .args(["cache", "list", "-f", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cache-workspace-api"))
            .stdout(predicate::str::contains("cache-workspace-web").not());
    }

    #[test]
    fn namespace_flag_scopes_commands() {
        let ws = Workspace::new();
        ws.run(&["-n", "team-a", "app", "create", "web"]);
        ws.corral()
            .args(["app", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No applications"));
        ws.corral()
            .args(["-n", "team-a", "app", "list", "-f", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("web"));
    }
}

mod api_tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use axum::Router;
    use corral::api::{build_router, ApiState};
    use corral::audit::AuditLog;
    use corral::config::Config;
    use corral::model::{Application, ObjectRef};
    use corral::store::{MemoryStore, ResourceStore};
    use corral::ControlPlane;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn setup(apps: &[&str], services: &[&str]) -> (Router, Arc<ControlPlane>) {
        let store: Arc<dyn ResourceStore> = Arc::new(MemoryStore::new());
        let plane = Arc::new(
            ControlPlane::with_audit(store, &Config::default(), AuditLog::disabled()).unwrap(),
        );
        for app in apps {
            plane
                .create_app(&ObjectRef::new("workspace", *app), None)
                .await
                .unwrap();
        }
        for service in services {
            plane
                .services
                .create("workspace", service, "postgres", Default::default())
                .await
                .unwrap();
        }
        (build_router(ApiState::new(plane.clone())), plane)
    }

    async fn send(router: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let request = builder
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn app(plane: &ControlPlane, name: &str) -> Application {
        plane
            .apps
            .get(&ObjectRef::new("workspace", name))
            .await
            .unwrap()
    }

    const BINDINGS: &str = "/api/v1/namespaces/workspace/applications/web/servicebindings";
    const CLEANUP: &str = "/api/v1/maintenance/cleanup-stale-caches";

    #[tokio::test]
    async fn batch_bind_returns_empty_object() {
        let (router, plane) = setup(&["web"], &["s1", "s2", "s3"]).await;

        let (status, body) = send(
            &router,
            Method::POST,
            BINDINGS,
            Some(r#"{"app_name":"web","service_names":["s1","s2","s3"]}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({}));
        let web = app(&plane, "web").await;
        assert_eq!(web.spec.bound_configurations.len(), 3);
        assert_eq!(web.status.restart_generation, 1);
    }

    #[tokio::test]
    async fn batch_bind_missing_service_is_404() {
        let (router, plane) = setup(&["web"], &["s1", "s3"]).await;

        let (status, body) = send(
            &router,
            Method::POST,
            BINDINGS,
            Some(r#"{"service_names":["s1","s2","s3"]}"#),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "not_found");
        assert!(body["error"]["message"].as_str().unwrap().contains("s2"));
        assert!(app(&plane, "web").await.spec.bound_configurations.is_empty());
    }

    #[tokio::test]
    async fn batch_bind_missing_app_is_404() {
        let (router, _) = setup(&[], &["s1"]).await;
        let (status, _) = send(
            &router,
            Method::POST,
            BINDINGS,
            Some(r#"{"service_names":["s1"]}"#),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn batch_bind_bad_requests_are_400() {
        let (router, _) = setup(&["web"], &["s1"]).await;

        for body in [
            r#"{"service_names":[]}"#,
            r#"{"service_names":["s1","s1"]}"#,
            r#"{"app_name":"other","service_names":["s1"]}"#,
            r#"{"service_names":"#,
        ] {
            let (status, response) = send(&router, Method::POST, BINDINGS, Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(response["error"]["code"], "bad_request");
        }
    }

    #[tokio::test]
    async fn legacy_bind_then_unbind() {
        let (router, plane) = setup(&["web"], &["db"]).await;

        let (status, body) = send(
            &router,
            Method::POST,
            "/api/v1/namespaces/workspace/services/db/bind",
            Some(r#"{"app_name":"web"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({}));
        assert!(app(&plane, "web").await.is_bound_to_service("db"));

        let (status, body) = send(
            &router,
            Method::DELETE,
            "/api/v1/namespaces/workspace/services/db/bind/web",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], json!(["xs-db-creds"]));
        assert!(!app(&plane, "web").await.is_bound_to_service("db"));
    }

    #[tokio::test]
    async fn update_service_respects_restart_flag() {
        let (router, plane) = setup(&["web"], &["db"]).await;
        plane
            .binder
            .bind_service(&ObjectRef::new("workspace", "web"), "db", false)
            .await
            .unwrap();

        let (status, body) = send(
            &router,
            Method::PATCH,
            "/api/v1/namespaces/workspace/services/db",
            Some(r#"{"set":{"user":"root"},"restart":false}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["bound_apps"], json!(["web"]));
        assert_eq!(body["redeployed"], json!([]));
        assert_eq!(app(&plane, "web").await.status.restart_generation, 0);

        let (status, _) = send(
            &router,
            Method::PATCH,
            "/api/v1/namespaces/workspace/services/ghost",
            Some(r#"{"set":{"user":"root"}}"#),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stage_and_show_app() {
        let (router, _) = setup(&["web"], &[]).await;

        let (status, body) = send(
            &router,
            Method::POST,
            "/api/v1/namespaces/workspace/applications/web/stage",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], "created");

        let (status, body) = send(
            &router,
            Method::GET,
            "/api/v1/namespaces/workspace/applications/web",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cache_volume"]["meta"]["name"], "cache-workspace-web");
        assert_eq!(body["cache_volume"]["status"]["phase"], "bound");
    }

    #[tokio::test]
    async fn cleanup_defaults_on_empty_body() {
        let (router, _) = setup(&[], &[]).await;
        let (status, body) = send(&router, Method::POST, CLEANUP, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dryRun"], false);
        assert_eq!(body["staleCaches"], json!([]));
        assert_eq!(body["deleted"], json!([]));
        assert!(body.get("errors").is_none());
    }

    #[tokio::test]
    async fn cleanup_invalid_stale_days_is_400() {
        let (router, _) = setup(&[], &[]).await;

        for body in [
            r#"{"staleDays":-1}"#,
            r#"{"staleDays":"abc"}"#,
            r#"{"staleDays":1.5}"#,
            r#"{"staleDays":true}"#,
        ] {
            let (status, response) = send(&router, Method::POST, CLEANUP, Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert!(response["error"]["message"]
                .as_str()
                .unwrap()
                .contains("invalid staleDays"));
        }

        let (status, _) = send(&router, Method::GET, &format!("{CLEANUP}?staleDays=x"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cleanup_query_dry_run_lists_orphans() {
        let (router, plane) = setup(&["web"], &[]).await;
        let web = ObjectRef::new("workspace", "web");
        plane.reconciler.reconcile(&web).await.unwrap();
        plane.delete_app(&web).await.unwrap();

        let (status, body) = send(
            &router,
            Method::GET,
            &format!("{CLEANUP}?staleDays=0&dryRun=true"),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dryRun"], true);
        assert_eq!(body["staleCaches"][0]["name"], "cache-workspace-web");
        assert_eq!(body["deleted"], json!([]));

        let (status, body) = send(
            &router,
            Method::POST,
            CLEANUP,
            Some(r#"{"staleDays":"0"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], json!(["cache-workspace-web"]));
    }
}
