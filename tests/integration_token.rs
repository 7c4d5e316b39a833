use std::collections::HashSet;
use vault_api::auth::CreateTokenOptions;
use vault_api::{VaultClient, VaultError, Wrapped};
use wiremock::matchers::{any, body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mock_vault_client(mock_uri: &str, token: &str) -> VaultClient {
    VaultClient::builder()
        .base_url(mock_uri)
        .token(token)
        .build()
        .unwrap()
}

fn auth_response(token: &str, accessor: &str, policies: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "request_id": "test-request-id",
        "lease_id": "",
        "renewable": false,
        "lease_duration": 0,
        "data": null,
        "wrap_info": null,
        "warnings": null,
        "auth": {
            "client_token": token,
            "accessor": accessor,
            "policies": policies,
            "token_policies": policies,
            "metadata": null,
            "lease_duration": 3600,
            "renewable": true,
            "entity_id": "",
            "token_type": "service",
            "orphan": false
        }
    })
}

fn lookup_response(id: &str, num_uses: u32) -> serde_json::Value {
    serde_json::json!({
        "data": {
            "accessor": "acc-1",
            "creation_time": 1704067200,
            "creation_ttl": 3600,
            "display_name": "token",
            "entity_id": "",
            "expire_time": "2024-01-01T01:00:00Z",
            "explicit_max_ttl": 0,
            "id": id,
            "issue_time": "2024-01-01T00:00:00Z",
            "meta": null,
            "num_uses": num_uses,
            "orphan": false,
            "path": "auth/token/create",
            "policies": ["default", "read-secret"],
            "renewable": true,
            "ttl": 3599,
            "type": "service"
        }
    })
}

#[tokio::test]
async fn test_create_returns_requested_policies() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/token/create"))
        .and(header("X-Vault-Token", "root"))
        .and(body_json(serde_json::json!({
            "policies": ["read-secret", "default"],
            "ttl": "1h"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_response(
            "s.child",
            "acc-child",
            &["default", "read-secret"],
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = mock_vault_client(&mock_server.uri(), "root");
    let created = client
        .tokens()
        .create(&CreateTokenOptions::new().policies(["read-secret", "default"]).ttl("1h"))
        .await
        .expect("should create token");

    let Wrapped::Data(auth) = created else {
        panic!("token should not be wrapped");
    };
    assert_eq!(auth.client_token, "s.child");
    assert_eq!(auth.accessor, "acc-child");

    let returned: HashSet<_> = auth.policies.iter().map(String::as_str).collect();
    let requested: HashSet<_> = ["read-secret", "default"].into_iter().collect();
    assert_eq!(returned, requested);
}

#[tokio::test]
async fn test_create_with_role_and_wrap_ttl_then_unwrap() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/token/create/ops"))
        .and(header("X-Vault-Wrap-TTL", "5m"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": null,
            "auth": null,
            "wrap_info": {
                "token": "s.wrapping",
                "accessor": "acc-wrap",
                "ttl": 300,
                "creation_time": "2024-01-01T00:00:00Z",
                "creation_path": "auth/token/create/ops",
                "wrapped_accessor": "acc-child"
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/sys/wrapping/unwrap"))
        .and(body_json(serde_json::json!({"token": "s.wrapping"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_response(
            "s.child",
            "acc-child",
            &["ops"],
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = mock_vault_client(&mock_server.uri(), "root");
    let created = client
        .tokens()
        .create(&CreateTokenOptions::new().role_name("ops").wrap_ttl("5m"))
        .await
        .unwrap();

    let info = created.wrap_info().expect("should be wrapped").clone();
    assert_eq!(info.wrapped_accessor.as_deref(), Some("acc-child"));

    let auth = client.unwrap_auth(Some(&info.token)).await.unwrap();
    assert_eq!(auth.client_token, "s.child");
    assert_eq!(auth.policies, vec!["ops"]);
}

#[tokio::test]
async fn test_invalid_arguments_never_reach_server() {
    let mock_server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = mock_vault_client(&mock_server.uri(), "root");
    let tokens = client.tokens();

    let result = tokens.create(&CreateTokenOptions::new().ttl("one hour")).await;
    assert!(matches!(result, Err(VaultError::Validation(_))));

    let result = tokens.renew("s.abc", Some("soon")).await;
    assert!(matches!(result, Err(VaultError::Validation(_))));

    let result = tokens.capabilities(&[], "s.abc").await;
    assert!(matches!(result, Err(VaultError::Validation(_))));

    let result = tokens.lookup_accessor("").await;
    assert!(matches!(result, Err(VaultError::Validation(_))));
}

#[tokio::test]
async fn test_lookup_variants() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/token/lookup"))
        .and(body_json(serde_json::json!({"token": "s.other"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(lookup_response("s.other", 0)))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/auth/token/lookup-self"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lookup_response("root", 0)))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/lookup-accessor"))
        .and(body_json(serde_json::json!({"accessor": "acc-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(lookup_response("", 0)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = mock_vault_client(&mock_server.uri(), "root");
    let tokens = client.tokens();

    let other = tokens.lookup("s.other").await.unwrap();
    assert_eq!(other.id, "s.other");
    assert_eq!(other.policies, vec!["default", "read-secret"]);

    assert_eq!(tokens.lookup_self().await.unwrap().id, "root");

    let by_accessor = tokens.lookup_accessor("acc-1").await.unwrap();
    assert!(by_accessor.id.is_empty());
    assert_eq!(by_accessor.accessor, "acc-1");
}

#[tokio::test]
async fn test_revoke_accessor_then_lookup_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/token/revoke-accessor"))
        .and(body_json(serde_json::json!({"accessor": "acc-1"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/lookup-accessor"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "errors": ["invalid accessor"]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = mock_vault_client(&mock_server.uri(), "root");
    let tokens = client.tokens();

    tokens.revoke_accessor("acc-1").await.expect("revoke should succeed");

    let err = tokens.lookup_accessor("acc-1").await.unwrap_err();
    assert!(err.is_server_error());
    assert_eq!(err.status(), Some(400));
    assert!(err.to_string().contains("invalid accessor"), "{}", err);
}

#[tokio::test]
async fn test_revoke_variants_and_tidy() {
    let mock_server = MockServer::start().await;

    for (endpoint, body) in [
        ("/v1/auth/token/revoke", serde_json::json!({"token": "s.a"})),
        ("/v1/auth/token/revoke-orphan", serde_json::json!({"token": "s.b"})),
        ("/v1/auth/token/revoke-self", serde_json::json!({})),
        ("/v1/auth/token/tidy", serde_json::json!({})),
    ] {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .and(body_json(body))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let client = mock_vault_client(&mock_server.uri(), "root");
    let tokens = client.tokens();

    tokens.revoke("s.a").await.unwrap();
    tokens.revoke_and_orphan("s.b").await.unwrap();
    tokens.revoke_self().await.unwrap();
    tokens.tidy().await.unwrap();
}

#[tokio::test]
async fn test_renew_with_and_without_increment() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/token/renew"))
        .and(body_json(serde_json::json!({"token": "s.a", "increment": "2h"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_response("s.a", "acc-a", &["default"])))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/renew-self"))
        .and(body_json(serde_json::json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_response("root", "acc-r", &["root"])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = mock_vault_client(&mock_server.uri(), "root");
    let tokens = client.tokens();

    let renewed = tokens.renew("s.a", Some("2h")).await.unwrap();
    assert_eq!(renewed.lease_duration, 3600);

    let renewed = tokens.renew_self(None).await.unwrap();
    assert_eq!(renewed.client_token, "root");
}

#[tokio::test]
async fn test_capabilities_for_read_policy() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/sys/capabilities"))
        .and(body_json(serde_json::json!({
            "paths": ["secret/path"],
            "token": "s.reader"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "secret/path": ["read"],
            "capabilities": ["read"],
            "data": {"secret/path": ["read"], "capabilities": ["read"]}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = mock_vault_client(&mock_server.uri(), "root");
    let caps = client
        .tokens()
        .capabilities(&["secret/path".to_string()], "s.reader")
        .await
        .unwrap();

    assert_eq!(caps.len(), 1);
    assert_eq!(caps["secret/path"], vec!["read"]);
}

#[tokio::test]
async fn test_capabilities_accessor_missing_path_is_deny() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/sys/capabilities-accessor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"secret/a": ["read", "list"]}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = mock_vault_client(&mock_server.uri(), "root");
    let caps = client
        .tokens()
        .capabilities_accessor(&["secret/a".to_string(), "secret/b".to_string()], "acc-1")
        .await
        .unwrap();

    assert_eq!(caps["secret/a"], vec!["read", "list"]);
    assert_eq!(caps["secret/b"], vec!["deny"]);
}

#[tokio::test]
async fn test_role_list_without_roles_is_empty() {
    let mock_server = MockServer::start().await;

    Mock::given(method("LIST"))
        .and(path("/v1/auth/token/roles"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({"errors": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = mock_vault_client(&mock_server.uri(), "root");
    let roles = client.tokens().role_list().await.expect("should not fail");
    assert!(roles.is_empty());
}

#[tokio::test]
async fn test_role_list_propagates_other_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("LIST"))
        .and(path("/v1/auth/token/roles"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "errors": ["permission denied"]
        })))
        .mount(&mock_server)
        .await;

    let client = mock_vault_client(&mock_server.uri(), "root");
    let err = client.tokens().role_list().await.unwrap_err();
    assert_eq!(err.status(), Some(403));
}

#[tokio::test]
async fn test_role_crud() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/token/roles/ops"))
        .and(body_json(serde_json::json!({
            "allowed_policies": ["ops"],
            "orphan": true,
            "token_period": "24h"
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/auth/token/roles/ops"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {
                "name": "ops",
                "allowed_policies": ["ops"],
                "disallowed_policies": [],
                "orphan": true,
                "period": 86400,
                "token_period": 86400,
                "renewable": true,
                "explicit_max_ttl": 0,
                "token_explicit_max_ttl": 0,
                "path_suffix": "",
                "token_bound_cidrs": null,
                "token_type": "default-service"
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("LIST"))
        .and(path("/v1/auth/token/roles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"keys": ["ops"]}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/auth/token/roles/ops"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = mock_vault_client(&mock_server.uri(), "root");
    let tokens = client.tokens();

    tokens
        .role_write(
            "ops",
            &vault_api::auth::TokenRoleOptions {
                allowed_policies: Some(vec!["ops".to_string()]),
                orphan: Some(true),
                period: Some("24h".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let role = tokens.role_read("ops").await.unwrap();
    assert_eq!(role.name, "ops");
    assert!(role.orphan);
    assert_eq!(role.period, 86400);
    assert!(role.token_bound_cidrs.is_empty());

    assert_eq!(tokens.role_list().await.unwrap(), vec!["ops"]);
    tokens.role_delete("ops").await.unwrap();
}

#[tokio::test]
async fn test_single_use_token_is_consumed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/token/create"))
        .and(body_json(serde_json::json!({"policies": ["read-secret"], "num_uses": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_response(
            "s.once",
            "acc-once",
            &["read-secret"],
        )))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/token/lookup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lookup_response("s.once", 1)))
        .expect(1)
        .mount(&mock_server)
        .await;
    // first use succeeds, afterwards the token is gone
    Mock::given(method("GET"))
        .and(path("/v1/auth/token/lookup-self"))
        .and(header("X-Vault-Token", "s.once"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lookup_response("s.once", 0)))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/auth/token/lookup-self"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "errors": ["permission denied"]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = mock_vault_client(&mock_server.uri(), "root");
    let created = client
        .tokens()
        .create(&CreateTokenOptions::new().policies(["read-secret"]).num_uses(1))
        .await
        .unwrap()
        .into_data()
        .unwrap();

    let looked_up = client.tokens().lookup(&created.client_token).await.unwrap();
    assert_eq!(looked_up.num_uses, 1);

    client.set_token(Some(created.client_token.clone())).await;
    assert!(client.tokens().lookup_self().await.is_ok());

    let err = client.tokens().lookup_self().await.unwrap_err();
    assert!(err.is_server_error());
    assert_eq!(err.status(), Some(403));
}

#[tokio::test]
async fn test_token_login_verifies_explicit_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/auth/token/lookup-self"))
        .and(header("X-Vault-Token", "s.explicit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lookup_response("s.explicit", 0)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = mock_vault_client(&mock_server.uri(), "root");
    let token = client.tokens().login(Some("s.explicit"), true).await.unwrap();
    assert_eq!(token, "s.explicit");
    // verification does not install the token
    assert_eq!(client.token().await.as_deref(), Some("root"));
}

#[tokio::test]
async fn test_token_login_falls_back_to_configured_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/auth/token/lookup-self"))
        .and(header("X-Vault-Token", "s.default"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lookup_response("s.default", 0)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = mock_vault_client(&mock_server.uri(), "s.default");
    let token = client.tokens().login(None, false).await.unwrap();
    assert_eq!(token, "s.default");
}

#[tokio::test]
async fn test_token_login_rejected_is_authentication_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/auth/token/lookup-self"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "errors": ["permission denied"]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = mock_vault_client(&mock_server.uri(), "root");
    let err = client.tokens().login(Some("s.bad"), false).await.unwrap_err();
    match err {
        VaultError::Authentication(message) => assert_eq!(message, "permission denied"),
        other => panic!("unexpected error: {:?}", other),
    }
}
