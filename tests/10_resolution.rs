mod common;

use anyhow::Result;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use campus_core::types::Role;

#[tokio::test]
async fn cached_handle_is_reference_equal() -> Result<()> {
    let platform = common::platform().await;
    let code = platform.service.resolve_school("ghs01").await?;

    let first = platform.connections.handle(&code).await?;
    let second = platform.connections.handle(&code).await?;

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(platform.connector.connections_created(), 1);
    Ok(())
}

#[tokio::test]
async fn racing_callers_share_one_connection() -> Result<()> {
    let platform = common::platform().await;
    let code = platform.service.resolve_school(common::SCHOOL_CODE).await?;

    // Stretch setup so every task arrives during the miss window
    platform
        .connector
        .set_connect_delay(Duration::from_millis(50));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let connections = platform.connections.clone();
            let code = code.clone();
            tokio::spawn(async move { connections.handle(&code).await })
        })
        .collect();

    let handles: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    for handle in &handles[1..] {
        assert!(Arc::ptr_eq(&handles[0], handle));
    }
    assert_eq!(platform.connector.connections_created(), 1);
    assert_eq!(platform.connector.connect_attempts(), 1);
    Ok(())
}

#[tokio::test]
async fn tenants_get_independent_handles() -> Result<()> {
    let platform = common::platform().await;
    platform.registry.register("NHS02", "Northside High").await?;

    let a = platform.service.school_handle(common::SCHOOL_CODE).await?;
    let b = platform.service.school_handle("NHS02").await?;

    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(platform.connector.connections_created(), 2);
    Ok(())
}

#[tokio::test]
async fn unknown_school_is_rejected() -> Result<()> {
    let platform = common::platform().await;

    let err = platform
        .service
        .authorize(Role::Teacher, "Wat Academy", "viewResults")
        .await
        .unwrap_err();
    assert!(err.is_unknown_school());

    // Arbitrary and malformed identifiers never pass through as codes
    for identifier in ["XYZ42", "school'; --", "..", ""] {
        let err = platform.service.school_handle(identifier).await.unwrap_err();
        assert!(err.is_unknown_school(), "{identifier}");
    }
    Ok(())
}

#[tokio::test]
async fn unreachable_store_surfaces_as_transient() -> Result<()> {
    let platform = common::platform().await;
    platform.connector.fail_connects(true);

    let err = platform
        .service
        .school_handle(common::SCHOOL_CODE)
        .await
        .unwrap_err();
    assert!(err.is_transient());
    Ok(())
}

#[tokio::test]
async fn stuck_setup_times_out_and_later_callers_recover() -> Result<()> {
    let platform = common::platform().await;

    // Setup takes far longer than the connect timeout allows
    platform
        .connector
        .set_connect_delay(Duration::from_millis(5_000));
    let err = platform
        .service
        .school_handle(common::SCHOOL_CODE)
        .await
        .unwrap_err();
    assert!(err.is_transient());

    // The guard was released with the failure; the next caller retries
    // setup and succeeds once the store responds again
    platform.connector.set_connect_delay(Duration::ZERO);
    platform.service.school_handle(common::SCHOOL_CODE).await?;
    assert_eq!(platform.connector.connections_created(), 1);
    Ok(())
}

#[tokio::test]
async fn register_school_stamps_tenant_info() -> Result<()> {
    let platform = common::platform().await;
    let code = platform
        .service
        .register_school("nhs02", "Northside High")
        .await?;
    assert_eq!(code.as_str(), "NHS02");

    let handle = platform.service.school_handle("NHS02").await?;
    let info = handle.tenant_info().await?.expect("tenant info stamped");
    assert_eq!(info.code, "NHS02");
    assert_eq!(info.display_name, "Northside High");
    Ok(())
}

#[tokio::test]
async fn deactivated_school_stops_resolving() -> Result<()> {
    let platform = common::platform().await;
    platform.service.school_handle(common::SCHOOL_CODE).await?;

    platform.service.deactivate_school(common::SCHOOL_CODE).await?;

    let err = platform
        .service
        .school_handle(common::SCHOOL_CODE)
        .await
        .unwrap_err();
    assert!(err.is_unknown_school());
    Ok(())
}
