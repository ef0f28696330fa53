use crate::helpers::{
    TestServices, count_requests, mount_clear_mailbox, mount_create_account,
    mount_destroy_account, mount_verification_email, mount_verify_code, ok_json,
};
use claims::assert_ok;
use fxa_fixtures::fixtures::{Fixtures, run_parametrized};
use fxa_fixtures::parametrize::{ACCOUNT_FIXTURE, TestItem, URLS_FIXTURE, fxa_env};
use std::collections::BTreeMap;
use wiremock::MockServer;

async fn identity_service() -> MockServer {
    let server = MockServer::start().await;
    mount_create_account(&server).await;
    mount_verify_code(&server, ok_json()).await;
    mount_destroy_account(&server, ok_json()).await;
    server
}

#[tokio::test]
async fn two_marked_environments_run_two_independent_accounts() {
    // Arrange
    let services = TestServices::start().await;
    mount_verification_email(&services.restmail).await;
    mount_clear_mailbox(&services.restmail).await;
    let alpha = identity_service().await;
    let beta = identity_service().await;

    let mut settings = services.settings();
    settings.environments = BTreeMap::from([
        (
            "alpha".to_string(),
            BTreeMap::from([("authentication".to_string(), format!("{}/v1", alpha.uri()))]),
        ),
        (
            "beta".to_string(),
            BTreeMap::from([("authentication".to_string(), format!("{}/v1", beta.uri()))]),
        ),
    ]);
    let fixtures = assert_ok!(Fixtures::new(settings));
    let item = TestItem::new("test_account")
        .uses(ACCOUNT_FIXTURE)
        .marked(fxa_env(["alpha", "beta"]));

    // Act
    let results = run_parametrized(&fixtures, &item, |request| async move {
        request
            .fxa_account(|fxa| async move { Ok(fxa.urls.authentication().to_string()) })
            .await
    })
    .await;

    // Assert
    assert_eq!(results.len(), 2);
    for (invocation, outcome) in results {
        let authentication = assert_ok!(assert_ok!(outcome).into_result());
        let expected = match invocation.environment.as_ref().map(AsRef::as_ref) {
            Some("alpha") => format!("{}/v1", alpha.uri()),
            Some("beta") => format!("{}/v1", beta.uri()),
            other => panic!("Unexpected invocation {:?}", other),
        };
        assert_eq!(authentication, expected);
    }
    for server in [&alpha, &beta] {
        assert_eq!(count_requests(server, "POST", "/v1/account/create").await, 1);
        assert_eq!(count_requests(server, "POST", "/v1/account/destroy").await, 1);
    }
}

#[tokio::test]
async fn marker_without_arguments_falls_back_to_the_default_environment() {
    let services = TestServices::start().await;
    let fixtures = services.fixtures();
    let item = TestItem::new("test_urls")
        .uses(URLS_FIXTURE)
        .marked(fxa_env(Vec::<String>::new()));

    let results = run_parametrized(&fixtures, &item, |request| async move {
        request
            .fxa_urls()
            .map(|urls| urls.authentication().to_string())
    })
    .await;

    assert_eq!(results.len(), 1);
    let (invocation, urls) = &results[0];
    assert_eq!(invocation.environment, None);
    assert_eq!(invocation.id, "test_urls");
    // `env` of the settings selects the mock environment
    assert_eq!(
        assert_ok!(urls.as_ref()),
        &format!("{}/v1", services.identity.uri())
    );
}
