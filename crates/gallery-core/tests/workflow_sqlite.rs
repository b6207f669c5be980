use gallery_core::{
    CreateImage, ErrorKind, GalleryWorkflow, ListQuery, UpdateImage, UploadedFile,
};
use gallery_db::{Database, FsObjectStore, ObjectStore};

const BASE: &str = "http://127.0.0.1:8080/storage";

fn jpeg(name: &str, payload: &[u8]) -> UploadedFile {
    UploadedFile {
        file_name: name.to_string(),
        content_type: "image/jpeg".to_string(),
        bytes: payload.to_vec(),
    }
}

async fn workflow(
    root: &std::path::Path,
) -> anyhow::Result<GalleryWorkflow<Database, FsObjectStore>> {
    let db = Database::connect("sqlite::memory:").await?;
    let objects = FsObjectStore::open(root, "gallery-images", BASE).await?;
    Ok(GalleryWorkflow::new(db, objects))
}

#[tokio::test]
async fn full_lifecycle_against_sqlite_and_filesystem() -> anyhow::Result<()> {
    let storage = tempfile::tempdir()?;
    let workflow = workflow(storage.path()).await?;

    let created = workflow
        .create(
            CreateImage::new("Harbor at dawn", "Fishing boats", vec!["landscape".into()])
                .with_file(jpeg("harbor.jpg", b"first")),
        )
        .await?;
    let first_key = created.image_key.clone().expect("uploaded key");
    assert!(storage
        .path()
        .join("gallery-images")
        .join(&first_key)
        .exists());

    let listed = workflow
        .list(ListQuery {
            title: Some("HARBOR".into()),
            tag: Some("landscape".into()),
            ..ListQuery::default()
        })
        .await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, created.id);

    let updated = workflow
        .update(
            created.id,
            UpdateImage {
                tags: Some(vec!["landscape".into(), "boats".into()]),
                file: Some(jpeg("harbor-v2.jpg", b"second")),
                ..UpdateImage::default()
            },
        )
        .await?;
    let second_key = updated.image_key.clone().expect("replacement key");
    assert_ne!(first_key, second_key);
    assert_eq!(updated.title, "Harbor at dawn");
    assert!(workflow.objects().download(&first_key).await?.is_none());
    let blob = workflow
        .objects()
        .download(&second_key)
        .await?
        .expect("replacement blob");
    assert_eq!(blob.bytes, b"second");
    assert_eq!(blob.content_type, "image/jpeg");

    let deleted = workflow.delete(created.id).await?;
    assert_eq!(deleted, created.id);
    assert!(workflow.objects().download(&second_key).await?.is_none());
    assert!(workflow.list(ListQuery::default()).await?.is_empty());

    let err = workflow.delete(created.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    Ok(())
}

#[tokio::test]
async fn clones_share_the_same_stores() -> anyhow::Result<()> {
    let storage = tempfile::tempdir()?;
    let workflow = workflow(storage.path()).await?;
    let other = workflow.clone();

    let mut request = CreateImage::new("Remote", "hosted elsewhere", vec!["misc".into()]);
    request.image_url = Some("https://cdn.example.com/remote.png".into());
    let created = other.create(request).await?;

    let listed = workflow.list(ListQuery::default()).await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, created.id);
    assert_eq!(listed[0].blob_key(), None);

    Ok(())
}

#[tokio::test]
async fn override_pointing_at_stored_blob_does_not_own_it() -> anyhow::Result<()> {
    let storage = tempfile::tempdir()?;
    let workflow = workflow(storage.path()).await?;

    let owner = workflow
        .create(
            CreateImage::new("Owner", "uploaded", vec!["misc".into()])
                .with_file(jpeg("owner.jpg", b"owned")),
        )
        .await?;
    let key = owner.image_key.clone().expect("uploaded key");

    let mut request = CreateImage::new("Alias", "same picture", vec!["misc".into()]);
    request.image_url = Some(owner.image_url.clone());
    let alias = workflow.create(request).await?;

    workflow.delete(alias.id).await?;

    let blob = workflow.objects().download(&key).await?.expect("owner blob");
    assert_eq!(blob.bytes, b"owned");
    let remaining = workflow.list(ListQuery::default()).await?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, owner.id);

    Ok(())
}

#[tokio::test]
async fn non_ascii_titles_match_case_insensitively() -> anyhow::Result<()> {
    let storage = tempfile::tempdir()?;
    let workflow = workflow(storage.path()).await?;

    let mut request = CreateImage::new("Été à Paris", "Quais", vec!["city".into()]);
    request.image_url = Some("https://cdn.example.com/paris.jpg".into());
    let created = workflow.create(request).await?;

    for needle in ["été", "ÉTÉ À"] {
        let found = workflow
            .list(ListQuery {
                title: Some(needle.into()),
                ..ListQuery::default()
            })
            .await?;
        assert_eq!(found.len(), 1, "{needle}");
        assert_eq!(found[0].id, created.id);
    }

    Ok(())
}
