mod common;

use montse::{
    core::model::InitialStatus,
    error::Error,
    infrastructure::{memory::MemoryIdentity, persistence::LocalStorage},
    preferences::Theme,
    routes::{Guarded, Route},
    Application,
};

#[tokio::test]
async fn guarded_pages_wait_for_the_session() -> montse::error::Result<()> {
    let (application, _directory) = common::application();
    assert_eq!(application.guard(Route::Home), Guarded::Pending);

    application.start().await?;
    assert_eq!(
        application.guard(Route::Home),
        Guarded::Redirect(Route::Login)
    );
    assert_eq!(
        application.guard(Route::Register),
        Guarded::Render(Route::Register)
    );

    application
        .register("Reader", common::EMAIL, common::PASSWORD)
        .await?;
    assert_eq!(application.guard(Route::Home), Guarded::Render(Route::Home));
    Ok(())
}

#[tokio::test]
async fn registration_writes_a_profile() -> montse::error::Result<()> {
    let (application, _directory) = common::signed_in().await;
    let user = application.session().user()?;

    assert_eq!(user.greeting_name(), "Reader");
    let profile = application
        .books()
        .documents()
        .profile_of(&user)
        .expect("a profile document");
    assert_eq!(profile.uid, user.id);
    assert_eq!(profile.name, "Reader");
    assert_eq!(profile.email, common::EMAIL);
    Ok(())
}

#[tokio::test]
async fn signing_out_clears_the_list_and_signing_in_reloads_it() -> montse::error::Result<()> {
    let (application, _directory) = common::signed_in().await;
    application
        .add_candidate(&common::dune(), InitialStatus::Reading)
        .await?;

    application.sign_out()?;
    assert!(application.books().snapshot().is_empty());
    assert!(matches!(application.reload().await, Err(Error::NotSignedIn)));
    assert!(matches!(
        application
            .add_candidate(&common::dune(), InitialStatus::Later)
            .await,
        Err(Error::NotSignedIn)
    ));

    application.sign_in(common::EMAIL, common::PASSWORD).await?;
    assert_eq!(application.books().snapshot().len(), 1);
    Ok(())
}

#[tokio::test]
async fn wrong_passwords_are_reported() {
    let (application, _directory) = common::signed_in().await;
    application.sign_out().expect("signed out");

    let result = application.sign_in(common::EMAIL, "not the password").await;
    assert!(result.is_err());
    assert!(!application.session().current().is_signed_in());
}

#[tokio::test]
async fn preferences_persist_between_runs() -> montse::error::Result<()> {
    let directory = tempfile::tempdir()?;

    {
        let storage = LocalStorage::try_new(directory.path())?;
        let application = Application::new(
            common::config(directory.path().to_owned()),
            storage,
            MemoryIdentity::default(),
            montse::infrastructure::memory::MemoryDocuments::default(),
            montse::infrastructure::memory::MemoryCatalog::default(),
        );
        assert_eq!(application.theme()?, Theme::Light);
        assert_eq!(application.toggle_theme()?, Theme::Dark);
        application.set_goal(Some(24))?;
    }

    let storage = LocalStorage::try_new(directory.path())?;
    assert_eq!(storage.theme()?, Theme::Dark);
    assert_eq!(storage.goal()?, Some(24));
    Ok(())
}

#[tokio::test]
async fn sessions_are_restored_between_runs() -> montse::error::Result<()> {
    let directory = tempfile::tempdir()?;
    let identity = MemoryIdentity::default();

    let registered = {
        let application = common::application_in(directory.path(), identity.clone());
        application.start().await?;
        application
            .register("Reader", common::EMAIL, common::PASSWORD)
            .await?
    };

    let application = common::application_in(directory.path(), identity.clone());
    assert_eq!(application.guard(Route::Home), Guarded::Pending);

    let restored = application.start().await?.expect("a restored session");
    assert_eq!(restored.id, registered.id);
    assert_eq!(restored.greeting_name(), "Reader");
    assert_ne!(restored.id_token, registered.id_token);
    assert_eq!(identity.refreshes(), 1);
    assert_eq!(application.guard(Route::Home), Guarded::Render(Route::Home));
    Ok(())
}

#[tokio::test]
async fn local_settings_work_while_books_cannot_be_loaded() -> montse::error::Result<()> {
    let directory = tempfile::tempdir()?;
    let identity = MemoryIdentity::default();

    {
        let application = common::application_in(directory.path(), identity.clone());
        application.start().await?;
        application
            .register("Reader", common::EMAIL, common::PASSWORD)
            .await?;
    }

    let application = common::application_in(directory.path(), identity);
    application.books().documents().set_failing(true);

    assert!(application.start().await?.is_some());
    assert!(application.books().snapshot().is_empty());
    assert!(application.reload().await.is_err());

    assert_eq!(application.toggle_theme()?, Theme::Dark);
    application.set_goal(Some(12))?;
    assert_eq!(application.goal()?, Some(12));
    application.sign_out()?;
    assert_eq!(application.guard(Route::Home), Guarded::Redirect(Route::Login));
    Ok(())
}
