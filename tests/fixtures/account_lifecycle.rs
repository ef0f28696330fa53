use crate::helpers::{
    TestServices, VERIFY_CODE, api_error, count_requests, mount_clear_mailbox,
    mount_create_account, mount_destroy_account, mount_login, mount_verification_email,
    mount_verify_code, ok_json, unknown_account,
};
use claims::{assert_err, assert_ok};
use fxa_fixtures::domain::is_generated_email;
use fxa_fixtures::identity_client::IdentityClient;
use fxa_fixtures::lifecycle::{SetupError, TeardownError};
use secrecy::ExposeSecret;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn account_can_log_in_with_its_credentials() {
    // Arrange
    let services = TestServices::start().await;
    services.mount_happy_path().await;
    mount_login(&services.identity).await;

    // Act
    let outcome = assert_ok!(
        services
            .fixtures()
            .default_request()
            .fxa_account(|fxa| async move {
                let logged_in = fxa
                    .client
                    .login(fxa.account.email(), fxa.account.password())
                    .await?;
                Ok(logged_in)
            })
            .await
    );

    // Assert
    assert!(assert_ok!(outcome.into_result()));
}

#[tokio::test]
async fn account_password_has_eight_letters_and_no_digits() {
    let services = TestServices::start().await;
    services.mount_happy_path().await;

    let outcome = assert_ok!(
        services
            .fixtures()
            .default_request()
            .fxa_account(|fxa| async move {
                Ok(fxa.account.password().expose_secret().clone())
            })
            .await
    );

    let password = assert_ok!(outcome.into_result());
    assert_eq!(password.len(), 8);
    assert!(!password.chars().any(|c| c.is_ascii_digit()));
}

#[tokio::test]
async fn account_is_verified_with_the_mailed_code_and_removed_afterwards() {
    let services = TestServices::start().await;
    mount_create_account(&services.identity).await;
    Mock::given(method("POST"))
        .and(path("/v1/recovery_email/verify_code"))
        .and(body_partial_json(serde_json::json!({ "code": VERIFY_CODE })))
        .respond_with(ok_json())
        .expect(1)
        .mount(&services.identity)
        .await;
    mount_destroy_account(&services.identity, ok_json()).await;
    mount_verification_email(&services.restmail).await;
    mount_clear_mailbox(&services.restmail).await;

    let outcome = assert_ok!(
        services
            .fixtures()
            .default_request()
            .fxa_account(|fxa| async move { Ok(fxa.account.email().to_string()) })
            .await
    );

    let email = assert_ok!(outcome.into_result());
    assert!(is_generated_email(&email));
    assert_eq!(
        count_requests(&services.identity, "POST", "/v1/account/destroy").await,
        1
    );
    let user = email.split('@').next().unwrap();
    assert_eq!(
        count_requests(&services.restmail, "DELETE", &format!("/mail/{}", user)).await,
        1
    );
}

#[tokio::test]
async fn account_destroyed_by_the_test_does_not_fail_teardown() {
    // Arrange
    let services = TestServices::start().await;
    mount_create_account(&services.identity).await;
    mount_verify_code(&services.identity, ok_json()).await;
    // The first destroy (from the test) succeeds, the second finds nothing.
    Mock::given(method("POST"))
        .and(path("/v1/account/destroy"))
        .respond_with(ok_json())
        .up_to_n_times(1)
        .mount(&services.identity)
        .await;
    mount_destroy_account(&services.identity, unknown_account()).await;
    mount_verification_email(&services.restmail).await;
    mount_clear_mailbox(&services.restmail).await;

    // Act
    let outcome = assert_ok!(
        services
            .fixtures()
            .default_request()
            .fxa_account(|fxa| async move {
                fxa.client
                    .destroy_account(fxa.account.email(), fxa.account.password())
                    .await?;
                Ok(())
            })
            .await
    );

    // Assert
    assert_ok!(outcome.into_result());
    assert_eq!(
        count_requests(&services.identity, "POST", "/v1/account/destroy").await,
        2
    );
}

#[tokio::test]
async fn unexpected_teardown_error_is_reported_apart_from_the_test_result() {
    let services = TestServices::start().await;
    mount_create_account(&services.identity).await;
    mount_verify_code(&services.identity, ok_json()).await;
    mount_destroy_account(
        &services.identity,
        api_error(500, 999, "Unspecified error"),
    )
    .await;
    mount_verification_email(&services.restmail).await;
    mount_clear_mailbox(&services.restmail).await;

    let outcome = assert_ok!(
        services
            .fixtures()
            .default_request()
            .fxa_account(|_fxa| async { Ok(()) })
            .await
    );

    assert_ok!(&outcome.body);
    let failure = assert_err!(outcome.into_result());
    assert!(failure.test.is_none());
    match failure.teardown {
        Some(TeardownError::DestroyAccount { source, .. }) => {
            assert_eq!(source.errno(), Some(999))
        }
        other => panic!("Expected a destroy failure, got {:?}", other),
    }
}

#[tokio::test]
async fn failed_verification_is_a_setup_error_and_cleans_up_once() {
    // Arrange
    let services = TestServices::start().await;
    mount_create_account(&services.identity).await;
    mount_verify_code(
        &services.identity,
        api_error(400, 105, "Invalid verification code"),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/v1/account/destroy"))
        .respond_with(ok_json())
        .expect(1)
        .mount(&services.identity)
        .await;
    mount_verification_email(&services.restmail).await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&services.restmail)
        .await;

    // Act
    let outcome = services
        .fixtures()
        .default_request()
        .fxa_account(|_fxa| async { Ok(()) })
        .await;

    // Assert
    match assert_err!(outcome) {
        SetupError::Verification { source, .. } => assert_eq!(source.errno(), Some(105)),
        other => panic!("Expected a verification error, got {:?}", other),
    }
}

#[tokio::test]
async fn failed_cleanup_does_not_replace_the_verification_error() {
    let services = TestServices::start().await;
    mount_create_account(&services.identity).await;
    mount_verify_code(
        &services.identity,
        api_error(400, 105, "Invalid verification code"),
    )
    .await;
    mount_destroy_account(&services.identity, ResponseTemplate::new(503)).await;
    mount_verification_email(&services.restmail).await;
    mount_clear_mailbox(&services.restmail).await;

    let outcome = services
        .fixtures()
        .default_request()
        .fxa_account(|_fxa| async { Ok(()) })
        .await;

    assert!(matches!(
        assert_err!(outcome),
        SetupError::Verification { .. }
    ));
}

#[tokio::test]
async fn rejected_registration_cleans_up_nothing() {
    let services = TestServices::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/account/create"))
        .respond_with(api_error(400, 101, "Account already exists"))
        .expect(1)
        .mount(&services.identity)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/account/destroy"))
        .respond_with(ok_json())
        .expect(0)
        .mount(&services.identity)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&services.restmail)
        .await;

    let outcome = services
        .fixtures()
        .default_request()
        .fxa_account(|_fxa| async { Ok(()) })
        .await;

    match assert_err!(outcome) {
        SetupError::CreateAccount { source, .. } => assert_eq!(source.errno(), Some(101)),
        other => panic!("Expected a registration error, got {:?}", other),
    }
}

#[tokio::test]
async fn missing_verification_email_times_out_and_cleans_up() {
    let services = TestServices::start().await;
    mount_create_account(&services.identity).await;
    Mock::given(method("POST"))
        .and(path("/v1/account/destroy"))
        .respond_with(ok_json())
        .expect(1)
        .mount(&services.identity)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&services.restmail)
        .await;
    mount_clear_mailbox(&services.restmail).await;

    let outcome = services
        .fixtures()
        .default_request()
        .fxa_account(|_fxa| async { Ok(()) })
        .await;

    assert!(matches!(
        assert_err!(outcome),
        SetupError::AwaitVerificationEmail { .. }
    ));
}

#[tokio::test]
async fn email_override_names_the_account_and_the_mailbox() {
    let services = TestServices::start().await;
    services.mount_happy_path().await;
    let settings = services
        .settings()
        .with_cli_email(Some("le-guin@restmail.net".to_string()));
    let fixtures = assert_ok!(fxa_fixtures::fixtures::Fixtures::new(settings));

    let outcome = assert_ok!(
        fixtures
            .default_request()
            .fxa_account(|fxa| async move { Ok(fxa.account.email().to_string()) })
            .await
    );

    assert_eq!(assert_ok!(outcome.into_result()), "le-guin@restmail.net");
    assert!(count_requests(&services.restmail, "GET", "/mail/le-guin").await >= 1);
}
