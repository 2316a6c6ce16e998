//! Manifest family handling: schema 1 chains and manifest list policies

mod common;

use common::*;
use image_import::config::{ImportConfig, ManifestListPolicy, Platform};
use image_import::error::ImportError;
use image_import::image::{DigestRegistry, Image};
use image_import::registry::{ImageStrategy, MemoryImageStore, Provenance};
use std::sync::Arc;
use std::time::{Duration, Instant};

const EMPTY_TAR: &str = "sha256:a3ed95caeb02ffe68cdd9fd84406680ae93d633cb16422d00e8a7c22955b46d4";
const BASE_BLOB: &str = "sha256:2d099e04ef6c850542d8ab916df2e9417cc799d39b78f64440e51402f1261a36";
const TOP_BLOB: &str = "sha256:766b6e9134dc2819fae9c5e67d39e14272948bc8967df9a119418cca84cab089";

fn schema1_manifest() -> String {
    let compat = |json: &str| serde_json::to_string(json).unwrap();
    let history = [
        compat(
            r##"{"id":"top","parent":"meta","architecture":"amd64","os":"linux","docker_version":"1.9.1","created":"2016-02-15T07:33:17.59074814Z","container_config":{"Cmd":["/bin/sh","-c","#(nop) COPY file:abc in /data"]},"Size":4096}"##,
        ),
        compat(r#"{"id":"meta","parent":"base","throwaway":true}"#),
        compat(r#"{"id":"base","size":1024,"created":"2016-02-15T07:30:00Z"}"#),
    ];
    format!(
        r#"{{
    "schemaVersion": 1,
    "name": "test/schema1",
    "tag": "latest",
    "architecture": "amd64",
    "fsLayers": [
        {{"blobSum": "{}"}},
        {{"blobSum": "{}"}},
        {{"blobSum": "{}"}}
    ],
    "history": [
        {{"v1Compatibility": {}}},
        {{"v1Compatibility": {}}},
        {{"v1Compatibility": {}}}
    ]
}}"#,
        TOP_BLOB, EMPTY_TAR, BASE_BLOB, history[0], history[1], history[2]
    )
}

fn list_image(list: &str) -> Image {
    let mut image = image_for(list, "", "library/busybox");
    image.docker_image_manifest_media_type = "application/vnd.oci.image.index.v1+json".to_string();
    image
}

fn resolving(config: ImportConfig, fetcher: FakeFetcher) -> ImageStrategy {
    ImageStrategy::new(config.with_manifest_list_policy(ManifestListPolicy::Resolve))
        .with_fetcher(Arc::new(fetcher))
}

#[tokio::test]
async fn schema1_layers_follow_the_parent_chain() {
    let manifest = schema1_manifest();
    let mut candidate = image_for(&manifest, "", "test/schema1:latest");
    candidate.docker_image_manifest_media_type =
        "application/vnd.docker.distribution.manifest.v1+prettyjws".to_string();

    let store = MemoryImageStore::new(ImageStrategy::default());
    let (created, derived) = store.create(candidate).await.unwrap();
    assert_eq!(derived, Provenance::Replaced);

    let names: Vec<&str> = created
        .docker_image_layers
        .iter()
        .map(|l| l.name.as_str())
        .collect();
    assert_eq!(names, vec![BASE_BLOB, TOP_BLOB]);
    assert_eq!(created.docker_image_layers[0].size, 1024);
    assert_eq!(created.docker_image_layers[1].size, 4096);

    let metadata = &created.docker_image_metadata;
    assert_eq!(metadata.id, "top");
    assert_eq!(metadata.parent, "meta");
    assert_eq!(metadata.size, 5120);
    assert_eq!(metadata.docker_version, "1.9.1");
    assert_eq!(metadata.history.len(), 3);
    assert!(metadata.history[1].empty_layer);
    assert_eq!(
        metadata.history[2].created_by,
        "/bin/sh -c #(nop) COPY file:abc in /data"
    );
}

#[tokio::test]
async fn schema1_with_broken_chain_is_rejected() {
    let manifest = schema1_manifest().replace(r#"\"parent\":\"meta\""#, r#"\"parent\":\"other\""#);
    assert!(manifest.contains("other"));
    let mut candidate = image_for(&manifest, "", "test/schema1");
    candidate.docker_image_manifest_media_type.clear();

    let err = MemoryImageStore::new(ImageStrategy::default())
        .create(candidate)
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::ManifestParse(_)));
}

#[tokio::test]
async fn accepted_list_records_children_without_layers() {
    let child = ubuntu_manifest();
    let child_digest = DigestRegistry::sha256(child.as_bytes()).to_string();
    let list = manifest_list(&[(child_digest.as_str(), "linux", "amd64")]);

    let (created, derived) = MemoryImageStore::new(ImageStrategy::default())
        .create(list_image(&list))
        .await
        .unwrap();
    assert_eq!(derived, Provenance::Replaced);
    assert!(created.docker_image_layers.is_empty());
    assert_eq!(created.docker_image_metadata.size, 0);
    assert_eq!(created.docker_image_manifests.len(), 1);
    assert_eq!(created.docker_image_manifests[0].digest, child_digest);
    assert_eq!(created.docker_image_manifests[0].architecture, "amd64");
    assert_eq!(created.docker_image_manifests[0].manifest_size, 500);
}

#[tokio::test]
async fn rejected_list_is_an_unresolved_list_error() {
    let list = manifest_list(&[(LAYER_DIGEST, "linux", "amd64")]);
    let strategy = ImageStrategy::new(
        ImportConfig::default().with_manifest_list_policy(ManifestListPolicy::Reject),
    );

    let err = strategy.prepare(None, list_image(&list)).await.unwrap_err();
    assert!(matches!(err, ImportError::UnresolvedManifestList { .. }));
    assert!(err.is_invalid());
}

#[tokio::test]
async fn resolved_list_derives_from_preferred_platform() {
    let arm_config = r#"{"architecture":"arm64","os":"linux"}"#;
    let arm = oci_manifest(arm_config, &[(LAYER_DIGEST, 10)]);
    let amd = ubuntu_manifest();
    let arm_digest = DigestRegistry::sha256(arm.as_bytes()).to_string();
    let amd_digest = DigestRegistry::sha256(amd.as_bytes()).to_string();
    let list = manifest_list(&[
        (arm_digest.as_str(), "linux", "arm64"),
        (amd_digest.as_str(), "linux", "amd64"),
    ]);

    let fetcher = FakeFetcher::default()
        .with_manifest(&amd)
        .with_blob(UBUNTU_CONFIG);
    let strategy = resolving(ImportConfig::default(), fetcher);

    let outcome = strategy.prepare(None, list_image(&list)).await.unwrap();
    assert_eq!(outcome.derived, Provenance::Replaced);
    let image = outcome.image;
    // The list stays the stored manifest
    assert_eq!(image.docker_image_manifest, list);
    assert_eq!(image.docker_image_manifests.len(), 2);
    assert_eq!(image.docker_image_layers.len(), 1);
    assert_eq!(image.docker_image_metadata.size, LAYER_SIZE);
    assert_eq!(image.docker_image_metadata.architecture, "amd64");
    assert_eq!(
        image.docker_image_metadata.id,
        DigestRegistry::sha256(UBUNTU_CONFIG.as_bytes()).to_string()
    );
}

#[tokio::test]
async fn resolved_list_falls_back_to_first_entry() {
    let config = r#"{"architecture":"s390x","os":"linux"}"#;
    let child = oci_manifest(config, &[(LAYER_DIGEST, 42)]);
    let digest = DigestRegistry::sha256(child.as_bytes()).to_string();
    let list = manifest_list(&[(digest.as_str(), "linux", "s390x")]);

    let fetcher = FakeFetcher::default().with_manifest(&child).with_blob(config);
    let settings = ImportConfig::default().with_preferred_platform(Platform {
        os: "windows".to_string(),
        architecture: "amd64".to_string(),
        variant: None,
    });

    let image = resolving(settings, fetcher)
        .prepare(None, list_image(&list))
        .await
        .unwrap()
        .image;
    assert_eq!(image.docker_image_metadata.architecture, "s390x");
    assert_eq!(image.docker_image_metadata.size, 42);
}

#[tokio::test]
async fn resolve_without_fetcher_is_unresolved() {
    let list = manifest_list(&[(LAYER_DIGEST, "linux", "amd64")]);
    let strategy = ImageStrategy::new(
        ImportConfig::default().with_manifest_list_policy(ManifestListPolicy::Resolve),
    );
    let err = strategy.prepare(None, list_image(&list)).await.unwrap_err();
    match err {
        ImportError::UnresolvedManifestList { digest, .. } => assert_eq!(digest, LAYER_DIGEST),
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn missing_child_is_unresolved() {
    let list = manifest_list(&[(LAYER_DIGEST, "linux", "amd64")]);
    let err = resolving(ImportConfig::default(), FakeFetcher::default())
        .prepare(None, list_image(&list))
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::UnresolvedManifestList { .. }));
}

#[tokio::test]
async fn slow_fetch_times_out() {
    let child = ubuntu_manifest();
    let digest = DigestRegistry::sha256(child.as_bytes()).to_string();
    let list = manifest_list(&[(digest.as_str(), "linux", "amd64")]);

    let fetcher = FakeFetcher::default()
        .with_manifest(&child)
        .with_blob(UBUNTU_CONFIG)
        .with_delay(Duration::from_secs(30));
    let err = resolving(ImportConfig::default().with_fetch_timeout(1), fetcher)
        .prepare(None, list_image(&list))
        .await
        .unwrap_err();
    match err {
        ImportError::UnresolvedManifestList { reason, .. } => assert!(reason.contains("timed out")),
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn child_bytes_must_match_descriptor_digest() {
    let child = ubuntu_manifest();
    let digest = DigestRegistry::sha256(child.as_bytes()).to_string();
    let list = manifest_list(&[(digest.as_str(), "linux", "amd64")]);

    let mut fetcher = FakeFetcher::default().with_blob(UBUNTU_CONFIG);
    fetcher
        .manifests
        .insert(digest.clone(), child.replace("29715337", "1"));

    let err = resolving(ImportConfig::default(), fetcher)
        .prepare(None, list_image(&list))
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::DigestMismatch { .. }));
}

#[tokio::test]
async fn nested_lists_are_rejected() {
    let inner = manifest_list(&[(LAYER_DIGEST, "linux", "amd64")]);
    let inner_digest = DigestRegistry::sha256(inner.as_bytes()).to_string();
    let outer = manifest_list(&[(inner_digest.as_str(), "linux", "amd64")]);

    let fetcher = FakeFetcher::default().with_manifest(&inner);
    let err = resolving(ImportConfig::default(), fetcher)
        .prepare(None, list_image(&outer))
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::ManifestParse(_)));
}

#[tokio::test]
async fn declared_media_type_must_match_content() {
    let manifest = ubuntu_manifest();
    let mut candidate = image_for(&manifest, UBUNTU_CONFIG, "openshift/origin");
    candidate.docker_image_manifest_media_type =
        "application/vnd.docker.distribution.manifest.list.v2+json".to_string();
    let err = ImageStrategy::default()
        .prepare(None, candidate)
        .await
        .unwrap_err();
    assert!(matches!(err, ImportError::ManifestParse(_)));

    // Old clients stored the config media type here; it is ignored
    let mut candidate = image_for(&manifest, UBUNTU_CONFIG, "openshift/origin");
    candidate.docker_image_manifest_media_type =
        "application/vnd.docker.container.image.v1+json".to_string();
    let outcome = ImageStrategy::default().prepare(None, candidate).await.unwrap();
    assert_eq!(outcome.image.docker_image_layers.len(), 1);
}

fn plain(name: &str) -> Image {
    let mut image = Image::default();
    image.metadata.name = name.to_string();
    image.docker_image_reference = "library/busybox".to_string();
    image
}

/// Store whose next list update waits `delay` on the registry
async fn store_with_slow_list(delay: Duration) -> (MemoryImageStore, Image) {
    let child = ubuntu_manifest();
    let digest = DigestRegistry::sha256(child.as_bytes()).to_string();
    let list = manifest_list(&[(digest.as_str(), "linux", "amd64")]);
    let fetcher = FakeFetcher::default()
        .with_manifest(&child)
        .with_blob(UBUNTU_CONFIG)
        .with_delay(delay);
    let store = MemoryImageStore::new(resolving(ImportConfig::default(), fetcher));

    store.create(plain("busybox")).await.unwrap();
    store.create(plain("other")).await.unwrap();

    let mut candidate = plain("busybox");
    candidate.docker_image_manifest_media_type =
        "application/vnd.oci.image.index.v1+json".to_string();
    candidate.docker_image_manifest = list;
    (store, candidate)
}

#[tokio::test]
async fn reads_are_not_blocked_while_a_list_resolves() {
    let (store, candidate) = store_with_slow_list(Duration::from_secs(2)).await;

    let read = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let started = Instant::now();
        let other = store.get("other").await.unwrap();
        (other, started.elapsed())
    };
    let (updated, (other, waited)) = tokio::join!(store.update(candidate), read);

    assert_eq!(other.name(), "other");
    assert!(waited < Duration::from_millis(500), "get waited {:?}", waited);
    let (updated, derived) = updated.unwrap();
    assert_eq!(derived, Provenance::Replaced);
    assert_eq!(updated.docker_image_layers.len(), 1);
    assert_eq!(updated.metadata.resource_version, "2");
}

#[tokio::test]
async fn write_during_resolution_is_a_conflict() {
    let (store, candidate) = store_with_slow_list(Duration::from_millis(500)).await;

    let relabel = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let mut current = store.get("busybox").await.unwrap();
        current.metadata.labels.insert("tier".to_string(), "base".to_string());
        store.update(current).await
    };
    let (slow, fast) = tokio::join!(store.update(candidate), relabel);

    let (relabelled, _) = fast.unwrap();
    assert_eq!(relabelled.metadata.resource_version, "2");
    assert!(matches!(slow, Err(ImportError::Conflict(_))));

    let stored = store.get("busybox").await.unwrap();
    assert_eq!(stored.metadata.labels["tier"], "base");
    assert!(!stored.has_manifest());
}
