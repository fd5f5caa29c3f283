mod common;

use anyhow::Result;
use futures::future::join_all;
use std::collections::HashSet;

use campus_core::identity::verify_credential;
use campus_core::types::Role;

#[tokio::test]
async fn concurrent_issuance_yields_distinct_identifiers() -> Result<()> {
    let platform = common::platform().await;

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let service = platform.service.clone();
            tokio::spawn(async move {
                service
                    .provision_user(Role::Student, common::SCHOOL_CODE, None)
                    .await
            })
        })
        .collect();

    let mut user_ids = HashSet::new();
    for joined in join_all(tasks).await {
        let issued = joined.unwrap()?;
        assert!(issued.user_id.starts_with("STU"), "{}", issued.user_id);
        let digits = &issued.user_id[3..];
        assert_eq!(digits.len(), 4, "{}", issued.user_id);
        assert!(digits.chars().all(|c| c.is_ascii_digit()), "{}", issued.user_id);
        user_ids.insert(issued.user_id);
    }

    // No duplicates and no silently dropped issuances
    assert_eq!(user_ids.len(), 50);
    Ok(())
}

#[tokio::test]
async fn student_credential_comes_from_date_of_birth() -> Result<()> {
    let platform = common::platform().await;
    let issued = platform
        .service
        .provision_user(Role::Student, common::SCHOOL_CODE, Some("15/01/2008".into()))
        .await?;
    assert_eq!(issued.credential, "15012008");
    Ok(())
}

#[tokio::test]
async fn teacher_credential_is_generated() -> Result<()> {
    let platform = common::platform().await;
    let issued = platform
        .service
        .provision_user(Role::Teacher, common::SCHOOL_CODE, None)
        .await?;

    assert_eq!(issued.credential.len(), 8);
    assert!(issued.credential.chars().any(|c| c.is_ascii_uppercase()));
    assert!(issued.credential.chars().any(|c| c.is_ascii_lowercase()));
    assert!(issued.credential.chars().any(|c| c.is_ascii_digit()));
    Ok(())
}

#[tokio::test]
async fn reset_twice_destroys_the_first_plaintext() -> Result<()> {
    let platform = common::platform().await;
    let issued = platform
        .service
        .provision_user(Role::Student, common::SCHOOL_CODE, Some("15/01/2008".into()))
        .await?;

    let first = platform
        .service
        .reset_credential(common::SCHOOL_CODE, &issued.user_id)
        .await?;
    let second = platform
        .service
        .reset_credential(common::SCHOOL_CODE, &issued.user_id)
        .await?;
    assert_ne!(first, second);

    let record = platform
        .service
        .find_user(common::SCHOOL_CODE, &issued.user_id)
        .await?
        .expect("user exists");

    // Stored state only knows the latest credential
    assert_eq!(record.credential_echo.as_deref(), Some(second.as_str()));
    assert!(record.credential_change_required);
    assert!(verify_credential(&second, &record.credential_hash).unwrap());
    assert!(!verify_credential(&first, &record.credential_hash).unwrap());
    assert!(!verify_credential("15012008", &record.credential_hash).unwrap());
    Ok(())
}

#[tokio::test]
async fn login_lookup_verifies_the_issued_credential() -> Result<()> {
    let platform = common::platform().await;
    let issued = platform
        .service
        .provision_user(Role::Parent, common::SCHOOL_CODE, None)
        .await?;

    let record = platform
        .service
        .find_user(common::SCHOOL_CODE, &issued.user_id)
        .await?
        .expect("user exists");
    assert!(verify_credential(&issued.credential, &record.credential_hash).unwrap());
    assert!(!verify_credential("wrong-credential", &record.credential_hash).unwrap());
    Ok(())
}
