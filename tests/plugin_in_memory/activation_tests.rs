//! Activation, restart flag, and pending-migration behaviour.

use super::helpers::{CHAIN, Harness, chain, id, ids};
use pilotis::plugin::{
    domain::{ActorId, PENDING_MIGRATIONS_KEY, RESTART_REQUIRED_KEY, StatusFlag},
    ports::{ActivationRepository, StatusFlagRepository},
    services::LifecycleError,
};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn activation_pulls_in_dependencies_once(chain: Harness) -> Result<(), eyre::Report> {
    let manager = &chain.manager;

    let first = manager.activate_with_dependencies(&id("shop"), None).await?;
    let second = manager.activate_with_dependencies(&id("shop"), None).await?;

    eyre::ensure!(first == ids(&["media", "blog", "shop"]), "first order: {first:?}");
    eyre::ensure!(second.is_empty(), "second call activated {second:?}");
    eyre::ensure!(manager.is_restart_required().await?, "restart flag should be set");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn partially_active_closure_only_activates_the_rest(
    chain: Harness,
) -> Result<(), eyre::Report> {
    let manager = &chain.manager;
    manager.activate(&id("media"), None).await?;

    let activated = manager.activate_with_dependencies(&id("shop"), None).await?;

    eyre::ensure!(activated == ids(&["blog", "shop"]), "activated {activated:?}");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn activation_records_the_actor(chain: Harness) -> Result<(), eyre::Report> {
    let actor = ActorId::new();

    chain.manager.activate(&id("media"), Some(actor)).await?;

    let record = chain
        .store
        .find_activation(&id("media"))
        .await?
        .ok_or_else(|| eyre::eyre!("missing activation record"))?;
    eyre::ensure!(record.is_active(), "record should be active");
    eyre::ensure!(record.activated_by() == Some(actor), "actor not recorded");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_package_blocks_the_whole_closure() -> Result<(), eyre::Report> {
    let harness = Harness::listing(&CHAIN).with_installed(&[("blog", &["media"])]);

    let result = harness
        .manager
        .activate_with_dependencies(&id("blog"), None)
        .await;

    eyre::ensure!(
        matches!(result, Err(LifecycleError::PackageNotInstalled(ref missing)) if missing == &id("media")),
        "unexpected result {result:?}"
    );
    eyre::ensure!(
        harness.store.list_activations().await?.is_empty(),
        "no record should be written"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_plugin_is_rejected_without_writes() -> Result<(), eyre::Report> {
    let harness = Harness::listing(&[("media", &[])]).with_installed(&[("media", &[])]);
    super::helpers::write_package(harness.root.path(), "orphan", &[]);

    let result = harness.manager.activate(&id("orphan"), None).await;

    eyre::ensure!(
        matches!(result, Err(LifecycleError::PluginNotFound(_))),
        "unexpected result {result:?}"
    );
    eyre::ensure!(
        !harness.manager.is_restart_required().await?,
        "restart flag should stay clear"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reactivation_keeps_the_deactivation_timestamp(
    chain: Harness,
) -> Result<(), eyre::Report> {
    let manager = &chain.manager;
    manager.activate(&id("media"), None).await?;
    manager.deactivate(&id("media")).await?;

    manager.activate(&id("media"), None).await?;

    let record = chain
        .store
        .find_activation(&id("media"))
        .await?
        .ok_or_else(|| eyre::eyre!("missing activation record"))?;
    eyre::ensure!(record.is_active(), "record should be active again");
    eyre::ensure!(record.deactivated_at().is_some(), "deactivation history lost");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn restart_flag_is_kept_as_false_once_complete(
    chain: Harness,
) -> Result<(), eyre::Report> {
    let manager = &chain.manager;
    manager.activate(&id("media"), None).await?;

    manager.mark_restart_complete().await?;

    eyre::ensure!(!manager.is_restart_required().await?, "restart still required");
    let flag = chain
        .store
        .get_flag(RESTART_REQUIRED_KEY)
        .await?
        .ok_or_else(|| eyre::eyre!("restart row should be kept"))?;
    eyre::ensure!(flag.value == "false", "unexpected flag value {}", flag.value);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn pending_migrations_keep_queue_order(chain: Harness) -> Result<(), eyre::Report> {
    let manager = &chain.manager;
    manager.activate_with_dependencies(&id("shop"), None).await?;

    manager.clear_pending_migration(&id("blog")).await?;

    let pending = manager.get_pending_migrations().await?;
    eyre::ensure!(pending == ids(&["media", "shop"]), "pending {pending:?}");
    eyre::ensure!(manager.clear_all_pending_migrations().await?, "queue should exist");
    eyre::ensure!(
        chain.store.get_flag(PENDING_MIGRATIONS_KEY).await?.is_none(),
        "queue row should be deleted"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn corrupt_flag_values_surface_as_store_errors(
    chain: Harness,
) -> Result<(), eyre::Report> {
    chain
        .store
        .set_flag(&StatusFlag::new(
            PENDING_MIGRATIONS_KEY,
            "not json",
            chrono::Utc::now(),
        ))
        .await?;

    let result = chain.manager.get_pending_migrations().await;

    eyre::ensure!(
        matches!(result, Err(LifecycleError::Store(_))),
        "unexpected result {result:?}"
    );
    Ok(())
}
